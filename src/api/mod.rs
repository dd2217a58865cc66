//! HTTP control surface: liveness, monitor status and the subject profile.

pub mod routes;

pub use routes::{ApiState, api_routes};

//! Placement alert: watches an inbox for campus placement mail and forwards
//! a summary to WhatsApp.

pub mod api;
pub mod attachments;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod profile;

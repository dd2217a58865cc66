//! Channel abstraction for mail intake and alert delivery.

pub mod channel;
pub mod email;
pub mod whatsapp;

pub use channel::*;
pub use email::{EmailConfig, ImapMailbox};
pub use whatsapp::{WhatsAppConfig, WhatsAppNotifier};

//! Channel traits for mail intake and alert delivery.

use async_trait::async_trait;

use crate::error::{ChannelError, NotifyError};
use crate::pipeline::types::MailMessage;

/// A source of unread mail.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Fetch unseen messages without changing their flags.
    async fn fetch_unseen(&self) -> Result<Vec<MailMessage>, ChannelError>;

    /// Flag the given uids as seen.
    async fn mark_seen(&self, uids: &[String]) -> Result<(), ChannelError>;
}

/// An outbound alert channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

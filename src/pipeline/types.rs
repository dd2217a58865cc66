//! Shared types for the classification pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default company when none can be determined.
pub const UNKNOWN_COMPANY: &str = "Unknown";

/// Default role when none can be determined.
pub const DEFAULT_ROLE: &str = "Position";

// ── Inbound mail ────────────────────────────────────────────────────

/// A file attached to an inbound message.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub payload: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            payload: payload.into(),
        }
    }
}

/// An unseen message as handed over by the mail source.
#[derive(Debug, Clone)]
pub struct MailMessage {
    /// Opaque mailbox identifier, used to mark the message seen.
    pub uid: String,
    /// Message-ID header (or a generated id), used for in-process dedup.
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    /// Plain text body, or HTML rendered to text.
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub received_at: DateTime<Utc>,
}

// ── Classification ──────────────────────────────────────────────────

/// Canonical output of both classifier paths.
///
/// Every field is always populated; unknown values use the defaults
/// (`"Unknown"`, `"Position"`, `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_placement_related: bool,
    pub company: String,
    pub role: String,
    pub deadline: Option<String>,
    pub salary: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub requirements: Option<String>,
    /// Bullet summary of the message, when the classifier produced one.
    pub description: Option<String>,
}

impl ClassificationResult {
    /// Result with every optional field absent.
    pub fn basic(is_placement_related: bool, company: String, role: String) -> Self {
        Self {
            is_placement_related,
            company,
            role,
            deadline: None,
            salary: None,
            location: None,
            job_type: None,
            requirements: None,
            description: None,
        }
    }
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self::basic(false, UNKNOWN_COMPANY.into(), DEFAULT_ROLE.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_documented_values() {
        let result = ClassificationResult::default();
        assert!(!result.is_placement_related);
        assert_eq!(result.company, "Unknown");
        assert_eq!(result.role, "Position");
        assert!(result.deadline.is_none());
        assert!(result.requirements.is_none());
    }

    #[test]
    fn job_type_serializes_as_type() {
        let mut result = ClassificationResult::default();
        result.job_type = Some("Internship".into());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "Internship");
        assert!(json.get("job_type").is_none());
        assert!(json["salary"].is_null());
    }
}

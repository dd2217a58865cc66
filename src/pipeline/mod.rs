//! Placement mail pipeline.
//!
//! Every unseen mail flows through:
//! 1. `Mailbox::fetch_unseen()`: channel-specific I/O
//! 2. `PlacementAnalyzer::analyze()`: LLM classification, keyword rules on failure
//! 3. `AttachmentScanner::scan()`: spreadsheets searched for the subject's tokens
//! 4. `Notifier::send()`: alert delivery, then the mail is marked seen
//!
//! Only placement mail is delivered and marked seen.

pub mod alert;
pub mod analyzer;
pub mod classifier;
pub mod monitor;
pub mod rules;
pub mod types;

pub use alert::format_placement_alert;
pub use analyzer::{Assessment, ClassificationSource, PlacementAnalyzer};
pub use classifier::LlmClassifier;
pub use monitor::{CycleReport, MonitorStats, PlacementMonitor, StatsSnapshot, spawn_monitor};
pub use rules::KeywordMatcher;
pub use types::{Attachment, ClassificationResult, MailMessage};

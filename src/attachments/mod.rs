//! Spreadsheet attachment scanning.
//!
//! Looks for the subject's identity tokens (name, registration number) in
//! every sheet of every spreadsheet attached to a placement mail, e.g. a
//! shortlist published by the placement cell.

pub mod scanner;
pub mod summary;

pub use scanner::{
    AttachmentScanResult, AttachmentScanner, FileMatch, SearchTerms, SheetMatch, is_spreadsheet,
};
pub use summary::format_attachment_summary;

//! Attachment scanner: literal identity-token search across spreadsheet sheets.
//!
//! Each spreadsheet is written to its own named temporary file, opened with
//! calamine, and searched sheet by sheet. The temporary file is removed when
//! its guard drops, on success and failure alike.
//!
//! Parsing and file I/O are blocking; async callers should run `scan` on
//! `spawn_blocking`.

use std::io::Write;
use std::path::{Path, PathBuf};

use calamine::{Reader, open_workbook_auto};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::AttachmentError;
use crate::pipeline::types::Attachment;

/// Filename extensions treated as spreadsheets (compared case-insensitively).
pub const SPREADSHEET_EXTENSIONS: [&str; 5] = [".xlsx", ".xls", ".xlsm", ".xlsb", ".ods"];

/// Identity tokens searched for when none are configured.
pub const DEFAULT_SEARCH_TERMS: [&str; 3] = ["Akkilesh A", "22BCE1385", "Akkilesh"];

/// Does this filename have a recognized spreadsheet extension?
pub fn is_spreadsheet(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    SPREADSHEET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

// ── Search terms ────────────────────────────────────────────────────

/// Ordered set of literal identity tokens.
///
/// Duplicates (ignoring case) are dropped at construction, keeping the first
/// spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerms {
    /// (original spelling, case-folded)
    terms: Vec<(String, String)>,
}

impl SearchTerms {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<(String, String)> = Vec::new();
        for term in terms {
            let term = term.as_ref().trim();
            if term.is_empty() {
                continue;
            }
            let folded = term.to_lowercase();
            if out.iter().all(|(_, f)| *f != folded) {
                out.push((term.to_string(), folded));
            }
        }
        Self { terms: out }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(t, _)| t.as_str())
    }

    /// Every term contained in `folded_text` (already lowercased), in term order.
    pub fn found_in(&self, folded_text: &str) -> Vec<String> {
        self.terms
            .iter()
            .filter(|(_, folded)| folded_text.contains(folded.as_str()))
            .map(|(term, _)| term.clone())
            .collect()
    }
}

impl Default for SearchTerms {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_TERMS)
    }
}

// ── Scan result ─────────────────────────────────────────────────────

/// Terms found in one sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetMatch {
    pub sheet: String,
    pub terms_found: Vec<String>,
}

/// Sheets with matches in one attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMatch {
    pub filename: String,
    pub matches: Vec<SheetMatch>,
}

/// Outcome of scanning all attachments of one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttachmentScanResult {
    pub has_attachments: bool,
    pub total_attachments: usize,
    pub excel_attachments: usize,
    /// True iff `found_in_files` is non-empty.
    pub name_found: bool,
    pub found_in_files: Vec<FileMatch>,
    pub error: Option<String>,
}

impl AttachmentScanResult {
    fn record_match(&mut self, file: FileMatch) {
        self.found_in_files.push(file);
        self.name_found = true;
    }

    fn record_error(&mut self, message: String) {
        self.error = Some(match self.error.take() {
            Some(existing) => format!("{existing}; {message}"),
            None => message,
        });
    }
}

// ── Scanner ─────────────────────────────────────────────────────────

/// Scans spreadsheet attachments for identity tokens.
#[derive(Debug, Clone, Default)]
pub struct AttachmentScanner {
    terms: SearchTerms,
    /// Where staged copies are written; the system temp dir when unset.
    staging_dir: Option<PathBuf>,
}

impl AttachmentScanner {
    pub fn new(terms: SearchTerms) -> Self {
        Self {
            terms,
            staging_dir: None,
        }
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn terms(&self) -> &SearchTerms {
        &self.terms
    }

    /// Scan a message's attachments. Never fails; per-file problems are
    /// logged and the remaining attachments are still scanned.
    pub fn scan(&self, attachments: &[Attachment]) -> AttachmentScanResult {
        let mut result = AttachmentScanResult {
            has_attachments: !attachments.is_empty(),
            total_attachments: attachments.len(),
            ..Default::default()
        };

        for attachment in attachments {
            info!(filename = %attachment.filename, "Processing attachment");
            if !is_spreadsheet(&attachment.filename) {
                continue;
            }
            result.excel_attachments += 1;

            match self.scan_file(attachment) {
                Ok(matches) if !matches.is_empty() => {
                    result.record_match(FileMatch {
                        filename: attachment.filename.clone(),
                        matches,
                    });
                }
                Ok(_) => {
                    debug!(filename = %attachment.filename, "No search terms found");
                }
                Err(e @ AttachmentError::Parse { .. }) => {
                    warn!(error = %e, "Unreadable spreadsheet, treating as no match");
                }
                Err(e @ AttachmentError::Io { .. }) => {
                    error!(error = %e, "Could not stage attachment for scanning");
                    result.record_error(e.to_string());
                }
            }
        }

        result
    }

    /// Stage one spreadsheet in a temporary file and search it.
    fn scan_file(&self, attachment: &Attachment) -> Result<Vec<SheetMatch>, AttachmentError> {
        let io_err = |source| AttachmentError::Io {
            filename: attachment.filename.clone(),
            source,
        };

        // calamine picks the format from the extension, so keep it.
        let suffix = extension(&attachment.filename);
        let mut builder = tempfile::Builder::new();
        builder.prefix("attachment-").suffix(&suffix);
        let mut staged = match &self.staging_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(io_err)?;
        staged.write_all(&attachment.payload).map_err(io_err)?;
        staged.flush().map_err(io_err)?;

        self.search_workbook(staged.path(), &attachment.filename)
        // `staged` drops here and deletes the file.
    }

    fn search_workbook(
        &self,
        path: &Path,
        filename: &str,
    ) -> Result<Vec<SheetMatch>, AttachmentError> {
        let parse_err = |reason: String| AttachmentError::Parse {
            filename: filename.to_string(),
            reason,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| parse_err(e.to_string()))?;

        let sheets = workbook.sheet_names().into_iter().map(|sheet| {
            debug!(sheet = %sheet, filename, "Searching sheet");
            let text = workbook
                .worksheet_range(&sheet)
                .map(|range| {
                    range
                        .rows()
                        .flat_map(|row| row.iter().map(|cell| cell.to_string()))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .map_err(|e| e.to_string());
            (sheet, text)
        });

        Ok(self.match_sheets(filename, sheets))
    }

    /// Search each sheet's flattened text. Unreadable sheets are skipped.
    fn match_sheets<I>(&self, filename: &str, sheets: I) -> Vec<SheetMatch>
    where
        I: IntoIterator<Item = (String, Result<String, String>)>,
    {
        let mut matches = Vec::new();
        for (sheet, text) in sheets {
            let text = match text {
                Ok(text) => text.to_lowercase(),
                Err(reason) => {
                    warn!(filename, sheet = %sheet, %reason, "Skipping unreadable sheet");
                    continue;
                }
            };

            let terms_found = self.terms.found_in(&text);
            if !terms_found.is_empty() {
                matches.push(SheetMatch { sheet, terms_found });
            }
        }
        matches
    }
}

/// Lowercased extension including the dot, or empty.
fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

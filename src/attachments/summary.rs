//! Human-readable rendering of an attachment scan.

use super::scanner::AttachmentScanResult;

/// Render a scan result for inclusion in an alert.
///
/// Returns `None` when the message had no attachments, or when nothing about
/// them is worth reporting (no spreadsheets and no error).
pub fn format_attachment_summary(result: &AttachmentScanResult) -> Option<String> {
    if !result.has_attachments {
        return None;
    }

    let mut lines = Vec::new();
    let excel = result.excel_attachments;

    if excel > 0 {
        lines.push(format!(
            "📎 {excel} Excel attachment{} found ({} total)",
            if excel == 1 { "" } else { "s" },
            result.total_attachments
        ));

        if result.name_found {
            lines.push("✅ Your name/ID found in attachments!".to_string());
            for file in &result.found_in_files {
                lines.push(format!("  📋 {}", file.filename));
                for sheet in &file.matches {
                    lines.push(format!(
                        "    🔍 {}: {}",
                        sheet.sheet,
                        sheet.terms_found.join(", ")
                    ));
                }
            }
        } else {
            lines.push("❌ Your name/ID not found in Excel files".to_string());
        }
    }

    if let Some(error) = &result.error {
        lines.push(format!("⚠️ Error processing attachments: {error}"));
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

//! Alert text for the delivery channel.
//!
//! Plain text with WhatsApp-style `*bold*` markers.

use crate::pipeline::types::ClassificationResult;

/// Max characters of the subject line shown in an alert.
pub const SUBJECT_MAX_CHARS: usize = 60;

/// Max characters of the requirements line shown in an alert.
pub const REQUIREMENTS_MAX_CHARS: usize = 100;

/// Render a placement alert.
pub fn format_placement_alert(
    subject: &str,
    result: &ClassificationResult,
    attachment_info: Option<&str>,
) -> String {
    let mut lines = vec![
        "🚨 *Placement Alert!*".to_string(),
        String::new(),
        format!("🏢 *Company:* {}", result.company),
        format!("💼 *Role:* {}", result.role),
    ];

    if let Some(job_type) = present(&result.job_type) {
        lines.push(format!("📋 *Type:* {job_type}"));
    }
    if let Some(location) = present(&result.location) {
        lines.push(format!("📍 *Location:* {location}"));
    }
    if let Some(salary) = present(&result.salary) {
        lines.push(format!("💰 *Salary:* {salary}"));
    }
    if let Some(deadline) = present(&result.deadline) {
        lines.push(format!("⏰ *Deadline:* {deadline}"));
    }
    if let Some(requirements) = present(&result.requirements) {
        lines.push(format!(
            "📝 *Requirements:* {}",
            truncate(requirements, REQUIREMENTS_MAX_CHARS)
        ));
    }
    if let Some(description) = present(&result.description) {
        lines.push(String::new());
        lines.push("📄 *Summary:*".to_string());
        lines.push(description.to_string());
    }

    lines.push(String::new());
    lines.push(format!("📧 *Subject:* {}", truncate(subject, SUBJECT_MAX_CHARS)));

    if let Some(info) = attachment_info.filter(|i| !i.trim().is_empty()) {
        lines.push(String::new());
        lines.push(info.to_string());
    }

    lines.push(String::new());
    lines.push("📬 Check your inbox!".to_string());

    lines.join("\n")
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Shorten to at most `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let head: String = text.chars().take(keep).collect();
    format!("{}...", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> ClassificationResult {
        ClassificationResult {
            is_placement_related: true,
            company: "Google".into(),
            role: "Software Engineer Intern".into(),
            deadline: Some("March 15".into()),
            salary: Some("1.2L/month".into()),
            location: Some("Bangalore".into()),
            job_type: Some("Internship".into()),
            requirements: Some("r".repeat(150)),
            description: Some("• Apply by March 15 • Online test on March 20".into()),
        }
    }

    #[test]
    fn minimal_alert() {
        let result = ClassificationResult::basic(true, "Tcs".into(), "Position".into());
        let text = format_placement_alert("TCS CodeVita Contest - Win Job Offers", &result, None);
        assert_eq!(
            text,
            "🚨 *Placement Alert!*\n\n🏢 *Company:* Tcs\n💼 *Role:* Position\n\n\
             📧 *Subject:* TCS CodeVita Contest - Win Job Offers\n\n📬 Check your inbox!"
        );
    }

    #[test]
    fn full_alert_includes_optional_fields() {
        let text = format_placement_alert("Google Internship", &full(), Some("📎 1 Excel attachment found"));
        assert!(text.contains("📋 *Type:* Internship"));
        assert!(text.contains("📍 *Location:* Bangalore"));
        assert!(text.contains("💰 *Salary:* 1.2L/month"));
        assert!(text.contains("⏰ *Deadline:* March 15"));
        assert!(text.contains("📄 *Summary:*\n• Apply by March 15"));
        assert!(text.contains("📎 1 Excel attachment found"));
        assert!(text.ends_with("📬 Check your inbox!"));
    }

    #[test]
    fn requirements_are_truncated() {
        let text = format_placement_alert("s", &full(), None);
        let line = text
            .lines()
            .find(|l| l.starts_with("📝"))
            .unwrap()
            .trim_start_matches("📝 *Requirements:* ");
        assert_eq!(line.chars().count(), REQUIREMENTS_MAX_CHARS);
        assert!(line.ends_with("..."));
    }

    #[test]
    fn long_subject_is_truncated() {
        let subject = "Campus Recruitment Drive 2026 for all eligible final year BTech students";
        let text = format_placement_alert(subject, &ClassificationResult::default(), None);
        let line = text.lines().find(|l| l.starts_with("📧")).unwrap();
        let shown = line.trim_start_matches("📧 *Subject:* ");
        assert!(shown.chars().count() <= SUBJECT_MAX_CHARS);
        assert!(shown.ends_with("..."));
        assert!(shown.starts_with("Campus Recruitment Drive 2026"));
    }

    #[test]
    fn blank_optional_fields_are_skipped() {
        let mut result = ClassificationResult::default();
        result.salary = Some("   ".into());
        let text = format_placement_alert("s", &result, Some("  "));
        assert!(!text.contains("Salary"));
        assert_eq!(text.matches("\n\n").count(), 3);
    }

    #[test]
    fn truncate_short_text_unchanged() {
        assert_eq!(truncate("short", 60), "short");
        assert_eq!(truncate("", 60), "");
    }
}

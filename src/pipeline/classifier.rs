//! LLM-backed placement classifier.
//!
//! Builds a profile-personalized prompt, sends it to the configured provider
//! and coerces the reply into a `ClassificationResult`. Failures are returned
//! as `ClassifierError`; choosing a fallback is the analyzer's job.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::ClassifierError;
use crate::llm::{ChatMessage, ClassifierCapability, CompletionRequest};
use crate::pipeline::types::{ClassificationResult, DEFAULT_ROLE, UNKNOWN_COMPANY};
use crate::profile::SubjectProfile;

/// Body characters included in the prompt.
const BODY_PREVIEW_CHARS: usize = 500;

/// Max tokens for the classification call.
const CLASSIFY_MAX_TOKENS: u32 = 1024;

/// Temperature for classification (deterministic-ish).
const CLASSIFY_TEMPERATURE: f32 = 0.1;

/// Fixed instructions sent as the system preamble.
const CLASSIFIER_PREAMBLE: &str = "You screen a university student's inbox for placement \
    opportunities. Answer every request with a single JSON object and nothing else.";

/// Placement classifier backed by a text-generation provider.
#[derive(Debug, Clone)]
pub struct LlmClassifier {
    capability: ClassifierCapability,
}

impl LlmClassifier {
    pub fn new(capability: ClassifierCapability) -> Self {
        Self { capability }
    }

    pub fn capability(&self) -> &ClassifierCapability {
        &self.capability
    }

    /// Classify one message.
    pub async fn classify(
        &self,
        subject: &str,
        sender: &str,
        body: &str,
        profile: &SubjectProfile,
    ) -> Result<ClassificationResult, ClassifierError> {
        let provider = match &self.capability {
            ClassifierCapability::Available(provider) => provider,
            ClassifierCapability::Unavailable(reason) => {
                return Err(ClassifierError::Unavailable {
                    reason: reason.clone(),
                });
            }
        };

        let prompt = build_placement_prompt(subject, sender, body, profile);
        let request = CompletionRequest::new(vec![
            ChatMessage::system(CLASSIFIER_PREAMBLE),
            ChatMessage::user(prompt),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = provider.complete(request).await?;

        let result = parse_classification(&response.content).inspect_err(|e| {
            warn!(error = %e, "Failed to parse classifier response");
            debug!(raw_response = %response.content, "Raw classifier response");
        })?;

        let subject_preview: String = subject.chars().take(50).collect();
        info!(
            subject = %subject_preview,
            company = %result.company,
            role = %result.role,
            placement = result.is_placement_related,
            "LLM classification"
        );

        Ok(result)
    }
}

// ── Prompt construction ─────────────────────────────────────────────

/// Build the classification prompt for one message.
pub fn build_placement_prompt(
    subject: &str,
    sender: &str,
    body: &str,
    profile: &SubjectProfile,
) -> String {
    let mut identity = format!(
        "I'm {}, currently pursuing my {} {} at {}, expected to graduate in {}.",
        profile.name, profile.degree, profile.year, profile.university, profile.graduation_year
    );
    if !profile.specialization.trim().is_empty() {
        identity.push_str(&format!(" My specialization is {}.", profile.specialization));
    }

    let body_line = if body.trim().is_empty() {
        String::new()
    } else {
        format!("- Body: \"{}\"\n", truncate_body(body))
    };

    format!(
        "{identity}\n\n\
         I need you to analyze the following email and determine if it's related to placement \
         opportunities, job offers, recruitment drives, internships, or career opportunities that \
         would be relevant for a student like me.\n\n\
         EMAIL DETAILS:\n\
         - Subject: \"{subject}\"\n\
         - Sender: \"{sender}\"\n\
         {body_line}\n\
         ANALYSIS CRITERIA:\n\
         Consider this email placement-related if it contains:\n\
         - Job opportunities, internships, or placement drives\n\
         - Company recruitment announcements\n\
         - Career fair invitations\n\
         - Application deadlines for jobs/internships\n\
         - Interview schedules or results\n\
         - Placement cell communications\n\
         - HR communications about hiring\n\
         - Skills assessment or coding challenges for recruitment\n\
         - Offer letters or joining instructions\n\n\
         IMPORTANT NOTES:\n\
         - Focus on opportunities suitable for my graduation year ({year})\n\
         - Consider both direct job offers and application opportunities\n\
         - Include both full-time positions and internships\n\
         - Consider emails from placement cells, HR departments, and recruiting companies\n\
         - Exclude spam, newsletters, or purely informational content not related to actual opportunities\n\n\
         FOR DESCRIPTION FIELD:\n\
         Provide a clear bullet-point summary of the email content covering key dates and \
         deadlines, registration requirements, test or interview details, important links, \
         eligibility criteria and next steps.\n\n\
         RESPONSE FORMAT:\n\
         Respond with a single JSON object:\n\
         {{\n\
           \"is_placement_related\": true/false,\n\
           \"company\": \"Company name if found, otherwise '{company}'\",\n\
           \"role\": \"Job role/position if found, otherwise '{role}'\",\n\
           \"deadline\": \"Application deadline if mentioned, otherwise null\",\n\
           \"salary\": \"Salary/CTC if mentioned, otherwise null\",\n\
           \"location\": \"Job location if mentioned, otherwise null\",\n\
           \"type\": \"Full-time/Internship/Contract/etc if identifiable, otherwise null\",\n\
           \"requirements\": \"Key requirements mentioned, otherwise null\",\n\
           \"description\": \"Bullet-point summary formatted as: • Point 1 • Point 2\"\n\
         }}\n\n\
         Return only the JSON object, no other text.",
        year = profile.graduation_year,
        company = UNKNOWN_COMPANY,
        role = DEFAULT_ROLE,
    )
}

fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() > BODY_PREVIEW_CHARS {
        let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{preview}...")
    } else {
        body.to_string()
    }
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse raw provider output into a fully-populated result.
pub fn parse_classification(raw: &str) -> Result<ClassificationResult, ClassifierError> {
    if raw.trim().is_empty() {
        return Err(ClassifierError::Format {
            reason: "empty response".into(),
        });
    }

    let json_str = extract_json_object(raw);
    let value: Value = serde_json::from_str(&json_str).map_err(|e| ClassifierError::Format {
        reason: format!("JSON parse error: {e}"),
    })?;
    let Value::Object(fields) = value else {
        return Err(ClassifierError::Format {
            reason: "response is not a JSON object".into(),
        });
    };

    let is_placement_related = match fields.get("is_placement_related") {
        Some(Value::Bool(flag)) => *flag,
        Some(other) => {
            return Err(ClassifierError::Format {
                reason: format!("is_placement_related is not a boolean: {other}"),
            });
        }
        None => {
            return Err(ClassifierError::Format {
                reason: "missing is_placement_related field".into(),
            });
        }
    };

    Ok(ClassificationResult {
        is_placement_related,
        company: text_field(&fields, "company").unwrap_or_else(|| UNKNOWN_COMPANY.to_string()),
        role: text_field(&fields, "role").unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        deadline: text_field(&fields, "deadline"),
        salary: text_field(&fields, "salary"),
        location: text_field(&fields, "location"),
        job_type: text_field(&fields, "type").or_else(|| text_field(&fields, "job_type")),
        requirements: text_field(&fields, "requirements"),
        description: text_field(&fields, "description"),
    })
}

/// Read an optional scalar field as text. Null, blank and non-scalar values are absent.
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        let inner = after.find("```").map_or(after, |end| &after[..end]);
        return inner.trim().to_string();
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let inner = after.find("```").map_or(after, |end| &after[..end]).trim();
        if inner.starts_with('{') {
            return inner.to_string();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

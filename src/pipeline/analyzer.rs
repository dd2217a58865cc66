//! Placement analyzer: LLM first, keyword rules as the fallback.
//!
//! `analyze()` never fails. A classifier error of any defined kind is logged
//! and replaced by the heuristic result. `assess()` also reports which path
//! produced the verdict so callers can tell a settled answer from a stopgap.

use tracing::{info, warn};

use crate::pipeline::classifier::LlmClassifier;
use crate::pipeline::rules::{KeywordMatcher, extract_fields};
use crate::pipeline::types::ClassificationResult;
use crate::profile::ProfileStore;

/// Which path produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    /// The LLM answered with a usable classification.
    Llm,
    /// No LLM is configured; keyword rules are the only classifier.
    Keywords,
    /// The LLM was configured but failed for this message.
    KeywordFallback,
}

impl ClassificationSource {
    /// Whether asking again later could change the verdict.
    pub fn is_provisional(self) -> bool {
        matches!(self, Self::KeywordFallback)
    }
}

/// A classification and the path that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub result: ClassificationResult,
    pub source: ClassificationSource,
}

/// Two-tier placement classifier.
pub struct PlacementAnalyzer {
    classifier: LlmClassifier,
    keywords: KeywordMatcher,
    profile: ProfileStore,
}

impl PlacementAnalyzer {
    pub fn new(classifier: LlmClassifier, keywords: KeywordMatcher, profile: ProfileStore) -> Self {
        Self {
            classifier,
            keywords,
            profile,
        }
    }

    pub fn classifier(&self) -> &LlmClassifier {
        &self.classifier
    }

    /// Classify a message, falling back to keyword rules on classifier failure.
    pub async fn analyze(&self, subject: &str, sender: &str, body: &str) -> ClassificationResult {
        self.assess(subject, sender, body).await.result
    }

    /// Like [`analyze`](Self::analyze), also reporting which path answered.
    pub async fn assess(&self, subject: &str, sender: &str, body: &str) -> Assessment {
        let profile = self.profile.snapshot().await;

        match self.classifier.classify(subject, sender, body, &profile).await {
            Ok(result) => Assessment {
                result,
                source: ClassificationSource::Llm,
            },
            Err(e) => {
                let source = if self.classifier.capability().is_available() {
                    warn!(kind = e.label(), error = %e, "LLM classification failed");
                    ClassificationSource::KeywordFallback
                } else {
                    info!(error = %e, "LLM classifier unavailable");
                    ClassificationSource::Keywords
                };
                info!(subject = %subject, "Falling back to keyword detection");
                Assessment {
                    result: self.fallback(subject, sender),
                    source,
                }
            }
        }
    }

    /// Heuristic classification from subject and sender only.
    pub fn fallback(&self, subject: &str, sender: &str) -> ClassificationResult {
        let is_placement_related = self.keywords.matches(subject, sender);
        let (company, role) = extract_fields(subject, sender);
        ClassificationResult::basic(is_placement_related, company, role)
    }
}

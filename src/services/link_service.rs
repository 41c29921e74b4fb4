//! Link service
//!
//! Business logic shared by every entry point: validate + shorten with a
//! detached safety check, and resolve a request path into a decision.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::errors::{Result, SafelinkError};
use crate::safety::Classifier;
use crate::storage::{Health, Shortened, Store, TargetRecord};
use crate::utils::url_validator::validate_url;

/// Outcome of resolving a short code
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Target is OK or not yet classified
    Redirect(Arc<TargetRecord>),
    /// Target is classified as phishing or malware
    Blocked(Arc<TargetRecord>, Health),
    /// Wrong length, invalid characters or unknown code
    NotFound,
}

impl Resolution {
    pub fn is_redirect(&self) -> bool {
        matches!(self, Resolution::Redirect(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Resolution::NotFound)
    }

    /// Target address for a redirect
    pub fn location(&self) -> Option<&str> {
        match self {
            Resolution::Redirect(record) => Some(record.address()),
            _ => None,
        }
    }

    /// Serializable summary for CLI output
    pub fn summary(&self) -> ResolutionSummary {
        match self {
            Resolution::Redirect(record) => ResolutionSummary {
                outcome: "redirect",
                code: Some(record.code().to_string()),
                address: Some(record.address().to_string()),
                health: Some(record.health()),
            },
            Resolution::Blocked(record, health) => ResolutionSummary {
                outcome: "blocked",
                code: Some(record.code().to_string()),
                address: Some(record.address().to_string()),
                health: Some(*health),
            },
            Resolution::NotFound => ResolutionSummary {
                outcome: "not_found",
                code: None,
                address: None,
                health: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionSummary {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<Health>,
}

/// Extract the code segment from a request path (`/AbCdEf`, `AbCdEf?x=1`)
fn code_segment(path: &str) -> &str {
    let path = path.trim().trim_start_matches('/');
    let end = path.find(['/', '?', '#']).unwrap_or(path.len());
    &path[..end]
}

pub struct LinkService {
    store: Arc<Store>,
    classifier: Arc<Classifier>,
}

impl LinkService {
    /// Create a new LinkService instance
    pub fn new(store: Arc<Store>, classifier: Arc<Classifier>) -> Self {
        Self { store, classifier }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Shorten an address
    ///
    /// Only http/https targets are accepted. A newly created record gets a
    /// background classification when called inside a tokio runtime; without
    /// one it stays UNKNOWN until revalidation. Existing records are returned
    /// as-is.
    pub fn shorten(&self, raw: &str) -> Result<Shortened> {
        validate_url(raw).map_err(|e| SafelinkError::validation(e.to_string()))?;

        let shortened = self.store.shorten_record(raw)?;
        if shortened.created {
            self.classifier
                .spawn_classify(Arc::clone(&shortened.record));
        } else {
            debug!("Reusing {} for {}", shortened.code(), shortened.record.address());
        }
        Ok(shortened)
    }

    /// Shorten and wait for the classification of a new record
    ///
    /// Used by one-shot commands that exit right after printing the result.
    pub async fn shorten_and_classify(&self, raw: &str) -> Result<(Shortened, Health)> {
        validate_url(raw).map_err(|e| SafelinkError::validation(e.to_string()))?;

        let shortened = self.store.shorten_record(raw)?;
        let health = if shortened.created {
            self.classifier.classify(&shortened.record, true).await
        } else {
            shortened.record.health()
        };
        Ok((shortened, health))
    }

    /// Resolve a request path
    pub fn resolve(&self, path: &str) -> Resolution {
        let segment = code_segment(path);
        let Some(record) = self.store.resolve_str(segment) else {
            trace!("No record for {:?}", segment);
            return Resolution::NotFound;
        };

        match record.health() {
            Health::Ok | Health::Unknown => Resolution::Redirect(record),
            health @ (Health::Phishing | Health::Malware) => Resolution::Blocked(record, health),
        }
    }
}

//! Remote fallback extractor
//!
//! An opaque text-to-event service used only when the local pipeline is
//! not authoritative: first-run bootstrap or an explicitly requested
//! alternate path. It returns the same `ParsedEventData` shape; any
//! transport error or timeout is treated as "no result" by callers, and
//! the local pipeline remains fully functional without it.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::event::ParsedEventData;

/// Anything that can turn raw text into an event record out-of-band.
pub trait FallbackExtractor {
    fn extract(&self, text: &str) -> Result<ParsedEventData>;
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// JSON-over-HTTP implementation: POSTs `{"text": ...}` and expects a
/// `ParsedEventData` body back.
pub struct HttpFallback {
    endpoint: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
}

impl HttpFallback {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl FallbackExtractor for HttpFallback {
    fn extract(&self, text: &str) -> Result<ParsedEventData> {
        debug!(endpoint = %self.endpoint, "calling remote fallback extractor");
        let response = ureq::post(&self.endpoint)
            .set("content-type", "application/json")
            .timeout(self.timeout)
            .send_json(&ExtractRequest { text })
            .context("fallback extractor request failed")?;
        response
            .into_json()
            .context("fallback extractor returned an unparseable body")
    }
}

//! Client for the external noun-phrase extraction service.
//!
//! The service takes `POST {"text": ...}` and answers with either
//! `{"phrases": [...]}` or the older `{"noun_phrases": [...]}`. Anything else
//! is rejected. Calls are single-attempt; callers degrade to "no phrases".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, ExtractorConfig, Result};

/// Source of raw candidate phrases for a block of text.
#[async_trait]
pub trait PhraseExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl<T: PhraseExtractor + ?Sized> PhraseExtractor for Arc<T> {
    async fn extract(&self, text: &str) -> Result<Vec<String>> {
        (**self).extract(text).await
    }
}

#[derive(Debug, Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhrasesBody {
    pub phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyBody {
    pub noun_phrases: Vec<String>,
}

/// Accepted response shapes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExtractorResponse {
    Phrases(PhrasesBody),
    Legacy(LegacyBody),
}

impl ExtractorResponse {
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| Error::ExtractorResponse(e.to_string()))
    }

    pub fn into_phrases(self) -> Vec<String> {
        match self {
            ExtractorResponse::Phrases(body) => body.phrases,
            ExtractorResponse::Legacy(body) => body.noun_phrases,
        }
    }
}

/// [`PhraseExtractor`] backed by the HTTP service.
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: Client,
    endpoint: String,
}

impl HttpExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("maxlink/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PhraseExtractor for HttpExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<String>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ExtractRequest { text })
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint = %self.endpoint, text = %excerpt(text), "extractor unreachable: {e}");
                Error::Http(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, text = %excerpt(text), "extractor rejected request");
            return Err(Error::ExtractorStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let phrases = ExtractorResponse::parse(&body)
            .inspect_err(|e| warn!(text = %excerpt(text), "{e}"))?
            .into_phrases();
        debug!(count = phrases.len(), chars = text.chars().count(), "extracted phrases");
        Ok(phrases)
    }
}

fn excerpt(text: &str) -> String {
    const LIMIT: usize = 80;
    let mut out: String = text.chars().take(LIMIT).collect();
    if text.chars().nth(LIMIT).is_some() {
        out.push('…');
    }
    out.replace('\n', " ")
}

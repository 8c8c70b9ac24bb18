use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Formality applied to every translation. Chosen once at startup via
/// configuration, not per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Formality {
    #[serde(rename = "FORMAL")]
    Formal,
    #[serde(rename = "INFORMAL")]
    Informal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Profanity {
    #[serde(rename = "MASK")]
    Mask,
    #[serde(rename = "NONE")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Brevity {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Engine {
    #[serde(rename = "neural")]
    Neural,
    #[serde(rename = "statistical")]
    Statistical,
}

/// Settings attached to every outgoing translation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationSettings {
    pub formality: Formality,
    pub profanity: Profanity,
    pub brevity: Brevity,
    pub engine: Engine,
}

impl TranslationSettings {
    /// Profanity masking, brevity, and the neural engine are fixed; only
    /// formality is configurable.
    pub fn with_formality(formality: Formality) -> Self {
        Self {
            formality,
            profanity: Profanity::Mask,
            brevity: Brevity::On,
            engine: Engine::Neural,
        }
    }
}

/// Wire request for the translation provider.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranslationRequest<'a> {
    text: &'a str,
    source_language_code: &'a str,
    target_language_code: &'a str,
    settings: TranslationSettings,
}

/// A terminology entry the provider reports as applied to the translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedTerminology {
    pub name: String,
    #[serde(default)]
    pub terms: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub source_text: String,
    pub target_text: String,
}

/// The provider's complete response, passed through without dropping or
/// renaming fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub translated_text: String,
    pub source_language_code: String,
    pub target_language_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_terminologies: Option<Vec<AppliedTerminology>>,
}

/// Client handle for the external translation service.
///
/// Constructed once by the process entry point and injected where needed;
/// there is no process-global client.
#[derive(Debug, Clone)]
pub struct TranslateClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    settings: TranslationSettings,
}

impl TranslateClient {
    pub fn new(
        http: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        formality: Formality,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            settings: TranslationSettings::with_formality(formality),
        }
    }

    /// Send one text block to the translation service and return the full
    /// response.
    ///
    /// Exactly one network call per invocation: no retry, no caching, no
    /// local timeout beyond the transport's own. Language codes are not
    /// validated here; an unsupported pair is rejected by the provider and
    /// that error propagates unchanged.
    pub async fn translate(
        &self,
        text: &str,
        source_language_code: &str,
        target_language_code: &str,
    ) -> Result<TranslationResult> {
        debug!(
            source = source_language_code,
            target = target_language_code,
            chars = text.len(),
            "Sending translation request"
        );

        let request = TranslationRequest {
            text,
            source_language_code,
            target_language_code,
            settings: self.settings,
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("Failed to send request to translation service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            anyhow::bail!("Translation service error ({}): {}", status, body);
        }

        let result: TranslationResult = response
            .json()
            .await
            .context("Failed to parse translation service response")?;

        Ok(result)
    }
}

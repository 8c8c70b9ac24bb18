use anyhow::{Context, Result};

use crate::translate::Formality;

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub api_key: Option<String>,

    // Document store
    pub database_path: String,

    // Translation provider
    pub translate_api_url: String,
    pub translate_api_key: String,
    pub translate_formality: Formality,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Server
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            // When unset, authentication is bypassed (local/dev mode)
            api_key: std::env::var("API_KEY").ok().filter(|v| !v.is_empty()),

            // Document store
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/relay-admin.db".to_string()),

            // Translation provider
            translate_api_url: std::env::var("TRANSLATE_API_URL")
                .context("TRANSLATE_API_URL not set")?,
            translate_api_key: std::env::var("TRANSLATE_API_KEY")
                .context("TRANSLATE_API_KEY not set")?,
            translate_formality: match std::env::var("TRANSLATE_FORMALITY").ok().as_deref() {
                None | Some("") | Some("FORMAL") => Formality::Formal,
                Some("INFORMAL") => Formality::Informal,
                Some(other) => anyhow::bail!(
                    "TRANSLATE_FORMALITY must be FORMAL or INFORMAL, got {}",
                    other
                ),
            },
        })
    }
}

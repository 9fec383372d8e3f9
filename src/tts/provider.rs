use std::sync::Arc;

use async_trait::async_trait;
use serde::{
    Deserialize,
    Serialize,
};

use super::{
    azure::AzureProvider,
    google::GoogleProvider,
    gtranslate::GtranslateProvider,
};
use crate::core::AnkitabError;

/// A single failed provider call. Transient failures are retried with
/// backoff; permanent ones (auth, invalid voice) surface immediately.
#[derive(Debug)]
pub enum ProviderFailure {
    Transient(String),
    Permanent(String),
}

impl ProviderFailure {
    pub fn reason(&self) -> &str {
        match self {
            ProviderFailure::Transient(reason) => reason,
            ProviderFailure::Permanent(reason) => reason,
        }
    }
}

/// The one capability every TTS backend provides. Concrete providers
/// differ only in auth and quota behavior, not in contract.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Default voice for a canonical language name. Errors when the
    /// provider has no catalog entry for the language.
    fn default_voice(&self, language: &str) -> Result<String, AnkitabError>;

    async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice_id: &str,
    ) -> Result<Vec<u8>, ProviderFailure>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Free unauthenticated endpoint, rate-limited.
    Gtranslate,
    Azure,
    Google,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gtranslate => "gtranslate",
            ProviderKind::Azure => "azure",
            ProviderKind::Google => "google",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureAccess {
    pub subscription_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleAccess {
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderAccessConfig {
    pub azure: Option<AzureAccess>,
    pub google: Option<GoogleAccess>,
}

/// Builds a provider for the configured backend. Selection is a
/// configuration value; missing credentials are a configuration error.
pub fn create_provider(
    kind: ProviderKind,
    access: &ProviderAccessConfig,
) -> Result<Arc<dyn TtsProvider>, AnkitabError> {
    match kind {
        ProviderKind::Gtranslate => Ok(Arc::new(GtranslateProvider::new()?)),
        ProviderKind::Azure => {
            let azure = access.azure.as_ref().ok_or_else(|| {
                AnkitabError::Custom(
                    "Azure TTS provider requires 'azure.subscription_key' and 'azure.region'"
                        .to_string(),
                )
            })?;
            Ok(Arc::new(AzureProvider::new(azure.clone())?))
        }
        ProviderKind::Google => {
            let google = access.google.as_ref().ok_or_else(|| {
                AnkitabError::Custom("Google TTS provider requires 'google.api_key'".to_string())
            })?;
            Ok(Arc::new(GoogleProvider::new(google.clone())?))
        }
    }
}

// Slashes become medium breaks, semicolons strong breaks; anything else
// passes through as plain text.
const SSML_BREAKS: &[(char, &str, &str)] = &[
    ('/', "<break strength='medium'/>", "__ankitab_sentinel_slash__"),
    (';', "<break strength='strong'/>", "__ankitab_sentinel_semicolon__"),
];

pub(crate) fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Returns the XML-escaped SSML fragment with break elements substituted,
/// or None when the text contains no break characters and can be sent as
/// plain text.
pub(crate) fn prepare_ssml_fragment(text: &str) -> Option<String> {
    if !SSML_BREAKS.iter().any(|(c, _, _)| text.contains(*c)) {
        return None;
    }

    let mut prepared = text.to_string();
    for (c, _, sentinel) in SSML_BREAKS {
        prepared = prepared.replace(*c, sentinel);
    }

    prepared = escape_xml(&prepared);

    for (_, replacement, sentinel) in SSML_BREAKS {
        prepared = prepared.replace(sentinel, replacement);
    }

    Some(prepared)
}

pub(crate) fn lookup_voice(
    catalog: &[(&str, &str)],
    language: &str,
    provider: &str,
) -> Result<String, AnkitabError> {
    for (lang, voice) in catalog {
        if *lang == language {
            return Ok((*voice).to_string());
        }
    }
    let mut known: Vec<&str> = catalog.iter().map(|(lang, _)| *lang).collect();
    known.sort_unstable();
    Err(AnkitabError::Custom(format!(
        "No default voice exists for language '{}' (provider: {}). Known languages: {}",
        language,
        provider,
        known.join(", ")
    )))
}

/// Shared retry classification for HTTP responses: rate limits and server
/// errors are worth retrying, everything else is not.
pub(crate) fn classify_status(status: reqwest::StatusCode, detail: String) -> ProviderFailure {
    if status.as_u16() == 408 || status.as_u16() == 429 || status.is_server_error() {
        ProviderFailure::Transient(format!("HTTP {}: {}", status, detail))
    } else {
        ProviderFailure::Permanent(format!("HTTP {}: {}", status, detail))
    }
}

pub(crate) fn classify_request_error(error: reqwest::Error) -> ProviderFailure {
    if error.is_timeout() || error.is_connect() {
        ProviderFailure::Transient(error.to_string())
    } else {
        ProviderFailure::Permanent(error.to_string())
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::provider::{
    classify_request_error,
    classify_status,
    lookup_voice,
    ProviderFailure,
    TtsProvider,
};
use crate::core::AnkitabError;

// The "voice" of this provider is just the translate language code.
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("english", "en"),
    ("german", "de"),
    ("russian", "ru"),
    ("spanish", "es"),
    ("french", "fr"),
    ("italian", "it"),
    ("portuguese", "pt"),
    ("dutch", "nl"),
    ("polish", "pl"),
    ("turkish", "tr"),
    ("arabic", "ar"),
    ("japanese", "ja"),
    ("chinese", "zh-CN"),
    ("korean", "ko"),
];

/// Free unauthenticated endpoint behind Google Translate's speaker
/// button. No credentials, aggressive rate limiting, plain text only.
pub struct GtranslateProvider {
    client: Client,
}

impl GtranslateProvider {
    pub fn new() -> Result<Self, AnkitabError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TtsProvider for GtranslateProvider {
    fn name(&self) -> &'static str {
        "gtranslate"
    }

    fn default_voice(&self, language: &str) -> Result<String, AnkitabError> {
        lookup_voice(LANGUAGE_CODES, language, self.name())
    }

    async fn synthesize(
        &self,
        text: &str,
        _language: &str,
        voice_id: &str,
    ) -> Result<Vec<u8>, ProviderFailure> {
        let response = self
            .client
            .get("https://translate.googleapis.com/translate_tts")
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", voice_id),
                ("q", text),
            ])
            .header("User-Agent", "ankitab")
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, detail));
        }

        let bytes = response.bytes().await.map_err(classify_request_error)?;
        if bytes.is_empty() {
            return Err(ProviderFailure::Transient("response contained no audio".to_string()));
        }

        Ok(bytes.to_vec())
    }
}

use std::time::Duration;

use async_trait::async_trait;
use base64::{
    engine::general_purpose::STANDARD as BASE64,
    Engine,
};
use reqwest::Client;
use serde::Deserialize;

use super::provider::{
    classify_request_error,
    classify_status,
    lookup_voice,
    prepare_ssml_fragment,
    GoogleAccess,
    ProviderFailure,
    TtsProvider,
};
use crate::core::AnkitabError;

const VOICES: &[(&str, &str)] = &[
    ("english", "en-US-Wavenet-C"),
    ("german", "de-DE-Wavenet-C"),
    ("russian", "ru-RU-Wavenet-C"),
    ("spanish", "es-ES-Wavenet-C"),
    ("french", "fr-FR-Wavenet-C"),
    ("italian", "it-IT-Wavenet-A"),
    ("portuguese", "pt-PT-Wavenet-A"),
    ("dutch", "nl-NL-Wavenet-A"),
    ("polish", "pl-PL-Wavenet-A"),
    ("turkish", "tr-TR-Wavenet-A"),
    ("arabic", "ar-XA-Wavenet-A"),
    ("japanese", "ja-JP-Wavenet-A"),
    ("chinese", "cmn-CN-Wavenet-A"),
    ("korean", "ko-KR-Wavenet-A"),
];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

/// Google Cloud Text-to-Speech, REST interface with API-key auth. Audio
/// comes back base64-encoded in a JSON envelope.
pub struct GoogleProvider {
    client: Client,
    access: GoogleAccess,
}

impl GoogleProvider {
    pub fn new(access: GoogleAccess) -> Result<Self, AnkitabError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, access })
    }
}

// Google voice ids lead with their language code, e.g. "de-DE-Wavenet-C"
fn language_code_of(voice_id: &str) -> String {
    voice_id.splitn(3, '-').take(2).collect::<Vec<_>>().join("-")
}

#[async_trait]
impl TtsProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn default_voice(&self, language: &str) -> Result<String, AnkitabError> {
        lookup_voice(VOICES, language, self.name())
    }

    async fn synthesize(
        &self,
        text: &str,
        _language: &str,
        voice_id: &str,
    ) -> Result<Vec<u8>, ProviderFailure> {
        let input = match prepare_ssml_fragment(text) {
            Some(fragment) => serde_json::json!({ "ssml": format!("<speak>{}</speak>", fragment) }),
            None => serde_json::json!({ "text": text }),
        };
        let body = serde_json::json!({
            "input": input,
            "voice": {
                "languageCode": language_code_of(voice_id),
                "name": voice_id,
            },
            "audioConfig": { "audioEncoding": "MP3" },
        });

        let response = self
            .client
            .post("https://texttospeech.googleapis.com/v1/text:synthesize")
            .query(&[("key", self.access.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, detail));
        }

        let payload: SynthesizeResponse =
            response.json().await.map_err(classify_request_error)?;
        let encoded = payload
            .audio_content
            .ok_or_else(|| ProviderFailure::Transient("response contained no audio".to_string()))?;

        BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| ProviderFailure::Permanent(format!("invalid audio payload: {}", e)))
    }
}

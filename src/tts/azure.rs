use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::provider::{
    classify_request_error,
    classify_status,
    escape_xml,
    lookup_voice,
    prepare_ssml_fragment,
    AzureAccess,
    ProviderFailure,
    TtsProvider,
};
use crate::core::AnkitabError;

const VOICES: &[(&str, &str)] = &[
    ("english", "en-US-JennyNeural"),
    ("german", "de-DE-KatjaNeural"),
    ("russian", "ru-RU-SvetlanaNeural"),
    ("spanish", "es-ES-ElviraNeural"),
    ("french", "fr-FR-DeniseNeural"),
    ("italian", "it-IT-ElsaNeural"),
    ("portuguese", "pt-PT-RaquelNeural"),
    ("dutch", "nl-NL-FennaNeural"),
    ("polish", "pl-PL-ZofiaNeural"),
    ("turkish", "tr-TR-EmelNeural"),
    ("arabic", "ar-EG-SalmaNeural"),
    ("japanese", "ja-JP-NanamiNeural"),
    ("chinese", "zh-CN-XiaoxiaoNeural"),
    ("korean", "ko-KR-SunHiNeural"),
];

/// Azure Cognitive Services Speech, REST interface. Auth is a
/// subscription key scoped to a region.
pub struct AzureProvider {
    client: Client,
    access: AzureAccess,
}

impl AzureProvider {
    pub fn new(access: AzureAccess) -> Result<Self, AnkitabError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, access })
    }

    fn endpoint(&self) -> String {
        format!("https://{}.tts.speech.microsoft.com/cognitiveservices/v1", self.access.region)
    }
}

// Azure voice ids lead with their locale, e.g. "de-DE-KatjaNeural"
fn locale_of(voice_id: &str) -> String {
    voice_id.splitn(3, '-').take(2).collect::<Vec<_>>().join("-")
}

#[async_trait]
impl TtsProvider for AzureProvider {
    fn name(&self) -> &'static str {
        "azure"
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
        let fragment = match prepare_ssml_fragment(text) {
            Some(fragment) => fragment,
            None => escape_xml(text),
        };
        let ssml = format!(
            "<speak version=\"1.0\" xmlns=\"http://www.w3.org/2001/10/synthesis\" \
             xml:lang=\"{}\"><voice name=\"{}\">{}</voice></speak>",
            locale_of(voice_id),
            voice_id,
            fragment,
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Ocp-Apim-Subscription-Key", &self.access.subscription_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", "audio-16khz-32kbitrate-mono-mp3")
            .header("User-Agent", "ankitab")
            .body(ssml)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_extraction() {
        assert_eq!(locale_of("de-DE-KatjaNeural"), "de-DE");
        assert_eq!(locale_of("zh-CN-XiaoxiaoNeural"), "zh-CN");
    }

    #[test]
    fn test_default_voice_catalog() {
        let provider =
            AzureProvider::new(AzureAccess { subscription_key: "k".into(), region: "westeurope".into() })
                .unwrap();
        assert_eq!(provider.default_voice("german").unwrap(), "de-DE-KatjaNeural");
        assert!(provider.default_voice("latin").is_err());
    }
}

use std::{
    collections::{
        HashMap,
        HashSet,
        VecDeque,
    },
    sync::{
        atomic::{
            AtomicBool,
            AtomicUsize,
            Ordering,
        },
        Arc,
        Mutex,
    },
    time::{
        Duration,
        Instant,
    },
};

use serde::Deserialize;
use tokio::time::sleep;

use self::{
    cache::AudioCache,
    provider::{
        create_provider,
        ProviderAccessConfig,
        ProviderFailure,
        ProviderKind,
        TtsProvider,
    },
};
use crate::core::{
    models::canonical_language,
    AnkitabError,
    AudioAsset,
    Note,
};

pub mod azure;
pub mod cache;
pub mod google;
pub mod gtranslate;
pub mod provider;

/// Text normalization for synthesis and audio binding: surrounding and
/// internal whitespace runs collapse, case is preserved.
pub fn normalize_audio_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Media filename for a cached clip, derived from the cache key so notes
/// sharing audio share the file.
pub fn media_filename(cache_key: &str) -> String {
    format!("ankitab-{}.mp3", &cache_key[..16])
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub provider: ProviderKind,
    /// Tried once (with its own retry loop and voice) when the primary
    /// provider fails an entry.
    pub fallback_provider: Option<ProviderKind>,
    /// Per-language voice override for the primary provider, keyed by
    /// canonical language name.
    pub voices: HashMap<String, String>,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff: Duration,
    pub best_effort: bool,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gtranslate,
            fallback_provider: None,
            voices: HashMap::new(),
            concurrency: 4,
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            best_effort: false,
        }
    }
}

/// One entry the run could not synthesize (best-effort mode only).
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub text: String,
    pub language: String,
    pub reason: String,
}

/// Result of a synthesis pass: assets keyed by (normalized text,
/// language), plus the skipped-entry manifest and call accounting.
#[derive(Debug, Default)]
pub struct SynthesisOutcome {
    pub assets: HashMap<(String, String), AudioAsset>,
    pub skipped: Vec<SkippedEntry>,
    pub provider_calls: usize,
    pub cache_hits: usize,
}

struct Job {
    text: String,
    language: String,
    voice: String,
    cache_key: String,
}

pub struct Synthesizer {
    primary: Arc<dyn TtsProvider>,
    fallback: Option<Arc<dyn TtsProvider>>,
    cache: AudioCache,
    voices: HashMap<String, String>,
    concurrency: usize,
    max_attempts: u32,
    backoff: Duration,
    best_effort: bool,
}

impl Synthesizer {
    pub fn new(
        primary: Arc<dyn TtsProvider>,
        fallback: Option<Arc<dyn TtsProvider>>,
        cache: AudioCache,
        config: TtsConfig,
    ) -> Self {
        let voices = config
            .voices
            .into_iter()
            .map(|(language, voice)| (canonical_language(&language), voice))
            .collect();

        Self {
            primary,
            fallback,
            cache,
            voices,
            concurrency: config.concurrency.max(1),
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff,
            best_effort: config.best_effort,
        }
    }

    pub fn from_config(
        config: TtsConfig,
        access: &ProviderAccessConfig,
        cache: AudioCache,
    ) -> Result<Self, AnkitabError> {
        let primary = create_provider(config.provider, access)?;
        let fallback = match config.fallback_provider {
            Some(kind) => Some(create_provider(kind, access)?),
            None => None,
        };
        Ok(Self::new(primary, fallback, cache, config))
    }

    fn resolve_voice(&self, language: &str) -> Result<String, AnkitabError> {
        if let Some(voice) = self.voices.get(language) {
            return Ok(voice.clone());
        }
        self.primary.default_voice(language)
    }

    /// Resolves every distinct (text, language) pair across the notes'
    /// front and back fields to an audio asset: dedup first, then cache
    /// lookups, then bounded-parallel provider calls for the misses.
    pub async fn synthesize_notes(
        &self,
        notes: &[Note],
        cancel_flag: Option<Arc<AtomicBool>>,
    ) -> Result<SynthesisOutcome, AnkitabError> {
        let start = Instant::now();

        // Dedup across the whole note sequence before any provider call
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut pairs: Vec<(String, String)> = Vec::new();
        for note in notes {
            for (text, language) in
                [(&note.front, &note.front_language), (&note.back, &note.back_language)]
            {
                let normalized = normalize_audio_text(text);
                if normalized.is_empty() {
                    continue;
                }
                let key = (normalized, language.clone());
                if seen.insert(key.clone()) {
                    pairs.push(key);
                }
            }
        }
        println!(
            "Synthesizing {} unique (text, language) pairs across {} notes",
            pairs.len(),
            notes.len()
        );

        let mut assets: HashMap<(String, String), AudioAsset> = HashMap::new();
        let mut cache_hits = 0;
        let mut jobs: VecDeque<Job> = VecDeque::new();

        for (text, language) in pairs {
            let voice = self.resolve_voice(&language)?;
            let cache_key = AudioCache::key(&text, &language, self.primary.name(), &voice);
            if let Some(bytes) = self.cache.lookup(&cache_key) {
                cache_hits += 1;
                assets.insert(
                    (text, language.clone()),
                    AudioAsset {
                        media_filename: media_filename(&cache_key),
                        cache_key,
                        language,
                        provider: self.primary.name().to_string(),
                        voice_id: voice,
                        bytes,
                    },
                );
            } else {
                jobs.push_back(Job { text, language, voice, cache_key });
            }
        }

        let provider_calls = AtomicUsize::new(0);
        let mut skipped = Vec::new();

        if !jobs.is_empty() {
            let workers = self.concurrency.min(jobs.len());
            println!("{} cache misses, dispatching on {} workers", jobs.len(), workers);

            let queue = Mutex::new(jobs);
            let results: Mutex<Vec<(Job, Result<AudioAsset, AnkitabError>)>> =
                Mutex::new(Vec::new());

            let mut worker_loops = Vec::with_capacity(workers);
            for _ in 0..workers {
                worker_loops.push(async {
                    loop {
                        if let Some(flag) = &cancel_flag {
                            if flag.load(Ordering::Relaxed) {
                                break;
                            }
                        }
                        let job = queue.lock().unwrap().pop_front();
                        let Some(job) = job else {
                            break;
                        };
                        let result = self.synthesize_pair(&job, &provider_calls).await;
                        results.lock().unwrap().push((job, result));
                    }
                });
            }
            futures::future::join_all(worker_loops).await;

            if let Some(flag) = &cancel_flag {
                if flag.load(Ordering::Relaxed) && !queue.lock().unwrap().is_empty() {
                    return Err(AnkitabError::Cancelled);
                }
            }

            for (job, result) in results.into_inner().unwrap() {
                match result {
                    Ok(asset) => {
                        assets.insert((job.text, job.language), asset);
                    }
                    Err(error) => {
                        if self.best_effort {
                            eprintln!("Skipping '{}' ({}): {}", job.text, job.language, error);
                            skipped.push(SkippedEntry {
                                text: job.text,
                                language: job.language,
                                reason: error.to_string(),
                            });
                        } else {
                            return Err(error);
                        }
                    }
                }
            }
        }

        let provider_calls = provider_calls.load(Ordering::Relaxed);
        println!(
            "Audio synthesis finished: {} provider calls, {} cache hits ({:.1}s)",
            provider_calls,
            cache_hits,
            start.elapsed().as_secs_f32()
        );

        Ok(SynthesisOutcome { assets, skipped, provider_calls, cache_hits })
    }

    async fn synthesize_pair(
        &self,
        job: &Job,
        provider_calls: &AtomicUsize,
    ) -> Result<AudioAsset, AnkitabError> {
        let primary_reason = match self
            .call_with_retry(self.primary.as_ref(), job, &job.voice, provider_calls)
            .await
        {
            Ok(bytes) => {
                return self.finish_asset(job, &job.cache_key, self.primary.name(), &job.voice, bytes)
            }
            Err(reason) => reason,
        };

        let Some(fallback) = &self.fallback else {
            return Err(AnkitabError::Synthesis {
                text: job.text.clone(),
                language: job.language.clone(),
                provider: self.primary.name().to_string(),
                reason: primary_reason,
            });
        };

        eprintln!(
            "Provider '{}' failed for '{}' ({}): {}. Falling back to '{}'",
            self.primary.name(),
            job.text,
            job.language,
            primary_reason,
            fallback.name()
        );

        let voice = fallback.default_voice(&job.language)?;
        let cache_key = AudioCache::key(&job.text, &job.language, fallback.name(), &voice);
        if let Some(bytes) = self.cache.lookup(&cache_key) {
            return Ok(AudioAsset {
                media_filename: media_filename(&cache_key),
                cache_key,
                language: job.language.clone(),
                provider: fallback.name().to_string(),
                voice_id: voice,
                bytes,
            });
        }

        match self.call_with_retry(fallback.as_ref(), job, &voice, provider_calls).await {
            Ok(bytes) => self.finish_asset(job, &cache_key, fallback.name(), &voice, bytes),
            Err(fallback_reason) => Err(AnkitabError::Synthesis {
                text: job.text.clone(),
                language: job.language.clone(),
                provider: fallback.name().to_string(),
                reason: format!(
                    "{} (primary '{}' failed first: {})",
                    fallback_reason,
                    self.primary.name(),
                    primary_reason
                ),
            }),
        }
    }

    async fn call_with_retry(
        &self,
        provider: &dyn TtsProvider,
        job: &Job,
        voice: &str,
        provider_calls: &AtomicUsize,
    ) -> Result<Vec<u8>, String> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            provider_calls.fetch_add(1, Ordering::Relaxed);
            match provider.synthesize(&job.text, &job.language, voice).await {
                Ok(bytes) => return Ok(bytes),
                Err(ProviderFailure::Transient(reason)) if attempt < self.max_attempts => {
                    let delay = self.backoff * 2u32.pow(attempt - 1);
                    println!(
                        "Transient failure for '{}' ({}) via '{}', retrying in {:?}: {}",
                        job.text,
                        job.language,
                        provider.name(),
                        delay,
                        reason
                    );
                    sleep(delay).await;
                }
                Err(ProviderFailure::Transient(reason)) => {
                    return Err(format!("gave up after {} attempts: {}", attempt, reason));
                }
                Err(ProviderFailure::Permanent(reason)) => return Err(reason),
            }
        }
    }

    // Persist before returning so a crash between synthesis and deck
    // assembly does not lose the audio for the next run.
    fn finish_asset(
        &self,
        job: &Job,
        cache_key: &str,
        provider: &str,
        voice: &str,
        bytes: Vec<u8>,
    ) -> Result<AudioAsset, AnkitabError> {
        self.cache.store(cache_key, &bytes)?;
        Ok(AudioAsset {
            cache_key: cache_key.to_string(),
            language: job.language.clone(),
            provider: provider.to_string(),
            voice_id: voice.to_string(),
            bytes,
            media_filename: media_filename(cache_key),
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::core::NoteType;

    /// Scripted provider: fails the first `failures` calls per run with a
    /// transient error, then succeeds.
    struct MockProvider {
        name: &'static str,
        calls: AtomicUsize,
        failures: usize,
        permanent: bool,
    }

    impl MockProvider {
        fn reliable(name: &'static str) -> Self {
            Self { name, calls: AtomicUsize::new(0), failures: 0, permanent: false }
        }

        fn flaky(name: &'static str, failures: usize) -> Self {
            Self { name, calls: AtomicUsize::new(0), failures, permanent: false }
        }

        fn broken(name: &'static str) -> Self {
            Self { name, calls: AtomicUsize::new(0), failures: usize::MAX, permanent: true }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl TtsProvider for MockProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn default_voice(&self, _language: &str) -> Result<String, AnkitabError> {
            Ok("test-voice".to_string())
        }

        async fn synthesize(
            &self,
            text: &str,
            _language: &str,
            _voice_id: &str,
        ) -> Result<Vec<u8>, ProviderFailure> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed);
            if n < self.failures {
                if self.permanent {
                    return Err(ProviderFailure::Permanent("bad credentials".to_string()));
                }
                return Err(ProviderFailure::Transient("rate limited".to_string()));
            }
            Ok(format!("mp3:{}", text).into_bytes())
        }
    }

    fn note(front: &str, back: &str) -> Note {
        Note {
            id: 0,
            guid: String::new(),
            front: front.to_string(),
            back: back.to_string(),
            front_language: "german".to_string(),
            back_language: "english".to_string(),
            front_audio: None,
            back_audio: None,
            note_type: NoteType::ForwardAndBackward,
        }
    }

    fn test_config() -> TtsConfig {
        TtsConfig { backoff: Duration::from_millis(5), ..TtsConfig::default() }
    }

    fn synthesizer_with(
        provider: Arc<MockProvider>,
        dir: &std::path::Path,
        config: TtsConfig,
    ) -> Synthesizer {
        let cache = AudioCache::new(dir.to_path_buf()).unwrap();
        Synthesizer::new(provider, None, cache, config)
    }

    #[tokio::test]
    async fn test_shared_phrases_are_synthesized_once() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::reliable("mock"));
        let synth = synthesizer_with(provider.clone(), dir.path(), test_config());

        // "Hello" appears as a back field and as a front field
        let notes = vec![note("Hallo", "Hello"), note("Hello", "Hallo")];
        let outcome = synth.synthesize_notes(&notes, None).await.unwrap();

        assert_eq!(outcome.assets.len(), 2);
        assert_eq!(provider.calls(), 2);
        assert_eq!(outcome.provider_calls, 2);
    }

    #[tokio::test]
    async fn test_warm_cache_issues_zero_calls() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::reliable("mock"));
        let synth = synthesizer_with(provider.clone(), dir.path(), test_config());

        let notes = vec![note("Hallo", "Hello")];
        let first = synth.synthesize_notes(&notes, None).await.unwrap();
        assert_eq!(first.cache_hits, 0);
        assert_eq!(provider.calls(), 2);

        let second = synth.synthesize_notes(&notes, None).await.unwrap();
        assert_eq!(second.cache_hits, 2);
        assert_eq!(second.provider_calls, 0);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_within_bound() {
        let dir = tempfile::tempdir().unwrap();
        // Fails twice, succeeds on the third attempt: within max_attempts = 3
        let provider = Arc::new(MockProvider::flaky("mock", 2));
        let config = TtsConfig { concurrency: 1, ..test_config() };
        let synth = synthesizer_with(provider.clone(), dir.path(), config);

        let notes = vec![note("Hallo", "")];
        let outcome = synth.synthesize_notes(&notes, None).await.unwrap();

        assert_eq!(outcome.assets.len(), 1);
        assert_eq!(provider.calls(), 3);
        let asset = outcome.assets.get(&("Hallo".to_string(), "german".to_string())).unwrap();
        assert_eq!(asset.bytes, b"mp3:Hallo");
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::flaky("mock", 4));
        let config = TtsConfig { concurrency: 1, ..test_config() };
        let synth = synthesizer_with(provider.clone(), dir.path(), config);

        let notes = vec![note("Hallo", "")];
        let error = synth.synthesize_notes(&notes, None).await.unwrap_err();

        assert_eq!(provider.calls(), 3);
        match error {
            AnkitabError::Synthesis { text, provider, .. } => {
                assert_eq!(text, "Hallo");
                assert_eq!(provider, "mock");
            }
            other => panic!("Expected Synthesis error, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::broken("mock"));
        let config = TtsConfig { concurrency: 1, ..test_config() };
        let synth = synthesizer_with(provider.clone(), dir.path(), config);

        let notes = vec![note("Hallo", "")];
        let error = synth.synthesize_notes(&notes, None).await.unwrap_err();

        assert_eq!(provider.calls(), 1);
        assert!(error.to_string().contains("bad credentials"));
    }

    #[tokio::test]
    async fn test_best_effort_reports_skipped_entries() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::broken("mock"));
        let config = TtsConfig { concurrency: 1, best_effort: true, ..test_config() };
        let synth = synthesizer_with(provider.clone(), dir.path(), config);

        let notes = vec![note("Hallo", "")];
        let outcome = synth.synthesize_notes(&notes, None).await.unwrap();

        assert!(outcome.assets.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].text, "Hallo");
        assert_eq!(outcome.skipped[0].language, "german");
    }

    #[tokio::test]
    async fn test_fallback_provider_covers_primary_failure() {
        let dir = tempfile::tempdir().unwrap();
        let primary = Arc::new(MockProvider::broken("primary"));
        let fallback = Arc::new(MockProvider::reliable("backup"));
        let cache = AudioCache::new(dir.path().to_path_buf()).unwrap();
        let config = TtsConfig { concurrency: 1, ..test_config() };
        let synth =
            Synthesizer::new(primary.clone(), Some(fallback.clone() as Arc<dyn TtsProvider>), cache, config);

        let notes = vec![note("Hallo", "")];
        let outcome = synth.synthesize_notes(&notes, None).await.unwrap();

        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
        let asset = outcome.assets.get(&("Hallo".to_string(), "german".to_string())).unwrap();
        assert_eq!(asset.provider, "backup");
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_calls() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::reliable("mock"));
        let synth = synthesizer_with(provider.clone(), dir.path(), test_config());

        let cancel = Arc::new(AtomicBool::new(true));
        let notes = vec![note("Hallo", "Hello")];
        let error = synth.synthesize_notes(&notes, Some(cancel)).await.unwrap_err();

        assert!(matches!(error, AnkitabError::Cancelled));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_variants_share_one_asset() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::reliable("mock"));
        let synth = synthesizer_with(provider.clone(), dir.path(), test_config());

        let notes = vec![note("guten  Morgen", ""), note(" guten Morgen ", "")];
        let outcome = synth.synthesize_notes(&notes, None).await.unwrap();

        assert_eq!(outcome.assets.len(), 1);
        assert_eq!(provider.calls(), 1);
    }
}

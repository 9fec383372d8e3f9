use std::{
    fs,
    path::PathBuf,
};

use sha2::{
    Digest,
    Sha256,
};
use uuid::Uuid;

use crate::{
    core::AnkitabError,
    persistence::get_audio_cache_dir,
};

/// Content-addressed audio cache: one MP3 file per cache key, shared
/// across runs, never evicted here. Writes go through a temp file and a
/// rename so concurrent writers of the same key are safe to race and a
/// half-received body is never stored.
#[derive(Debug, Clone)]
pub struct AudioCache {
    dir: PathBuf,
}

impl AudioCache {
    pub fn new(dir: PathBuf) -> Result<Self, AnkitabError> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn default_location() -> Result<Self, AnkitabError> {
        Self::new(get_audio_cache_dir())
    }

    /// Cache key for one synthesis request. Everything that changes the
    /// produced audio participates in the hash.
    pub fn key(normalized_text: &str, language: &str, provider: &str, voice_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalized_text.as_bytes());
        hasher.update([0x1f]);
        hasher.update(language.as_bytes());
        hasher.update([0x1f]);
        hasher.update(provider.as_bytes());
        hasher.update([0x1f]);
        hasher.update(voice_id.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn path_for(&self, cache_key: &str) -> PathBuf {
        self.dir.join(format!("{}.mp3", cache_key))
    }

    pub fn lookup(&self, cache_key: &str) -> Option<Vec<u8>> {
        fs::read(self.path_for(cache_key)).ok()
    }

    pub fn store(&self, cache_key: &str, bytes: &[u8]) -> Result<(), AnkitabError> {
        let tmp_path = self.dir.join(format!(".{}-{}.tmp", &cache_key[..16], Uuid::new_v4()));
        fs::write(&tmp_path, bytes)?;
        if let Err(e) = fs::rename(&tmp_path, self.path_for(cache_key)) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

use std::{
    collections::HashSet,
    fs,
    path::{
        Path,
        PathBuf,
    },
    time::Instant,
};

use regex::Regex;
use sha2::{
    Digest,
    Sha256,
};
use uuid::Uuid;

use crate::{
    core::{
        AnkitabError,
        DeckSummary,
        MergeTarget,
        Note,
        NoteType,
    },
    tts::{
        normalize_audio_text,
        SynthesisOutcome,
    },
};

pub mod collection;
pub mod package;

fn derive_container_id(salt: &str, deck_name: &str, note_type: NoteType) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update([0x1f]);
    hasher.update(deck_name.trim().as_bytes());
    hasher.update([0x1f]);
    hasher.update(note_type.as_str().as_bytes());
    let digest = hasher.finalize();
    let raw = u64::from_be_bytes(digest[..8].try_into().unwrap());
    // The 2^30..2^31 range conventional for generated deck/model ids
    ((raw % (1 << 30)) + (1 << 30)) as i64
}

/// Deck id as a pure function of (name, note type): compiling the same
/// named deck twice produces a container Anki merges instead of
/// duplicating.
pub fn deck_id_for(deck_name: &str, note_type: NoteType) -> i64 {
    derive_container_id("deck", deck_name, note_type)
}

pub fn model_id_for(deck_name: &str, note_type: NoteType) -> i64 {
    derive_container_id("model", deck_name, note_type)
}

/// Filesystem-safe stem for naming the artifact after the deck.
pub fn sanitize_deck_filename(deck_name: &str) -> String {
    let collapsed = Regex::new(r"\s+").unwrap().replace_all(deck_name.trim(), "_").to_string();
    let cleaned = Regex::new(r"[^A-Za-z0-9_-]").unwrap().replace_all(&collapsed, "").to_string();
    if cleaned.is_empty() {
        "Ankitab".to_string()
    } else {
        cleaned
    }
}

/// Binds notes to their audio assets, computes container identifiers,
/// and serializes the `.apkg` artifact.
pub struct DeckAssembler {
    deck_name: String,
    note_type: NoteType,
    output_path: PathBuf,
}

impl DeckAssembler {
    pub fn new(deck_name: &str, note_type: NoteType, output_path: &Path) -> Self {
        Self {
            deck_name: deck_name.to_string(),
            note_type,
            output_path: output_path.to_path_buf(),
        }
    }

    pub fn assemble(
        &self,
        mut notes: Vec<Note>,
        outcome: &SynthesisOutcome,
        merge_target: Option<&MergeTarget>,
        dedup_existing: bool,
    ) -> Result<DeckSummary, AnkitabError> {
        let start = Instant::now();

        let (deck_id, model_id) = match merge_target {
            Some(target) => (target.deck_id, target.model_id),
            None => (
                deck_id_for(&self.deck_name, self.note_type),
                model_id_for(&self.deck_name, self.note_type),
            ),
        };

        let skipped_pairs: HashSet<(String, String)> = outcome
            .skipped
            .iter()
            .map(|entry| (entry.text.clone(), entry.language.clone()))
            .collect();

        for note in &mut notes {
            note.front_audio =
                bind_side(&note.front, &note.front_language, outcome, &skipped_pairs)?;
            note.back_audio = bind_side(&note.back, &note.back_language, outcome, &skipped_pairs)?;
        }

        let mut duplicates_skipped = 0;
        if dedup_existing {
            if let Some(target) = merge_target {
                let before = notes.len();
                notes.retain(|note| !target.existing_note_ids.contains(&note.id));
                duplicates_skipped = before - notes.len();
            }
        }

        // Only media actually referenced by a surviving note ships
        let referenced: HashSet<&String> = notes
            .iter()
            .flat_map(|note| note.front_audio.iter().chain(note.back_audio.iter()))
            .collect();
        let mut media: Vec<(String, Vec<u8>)> = outcome
            .assets
            .values()
            .filter(|asset| referenced.contains(&asset.media_filename))
            .map(|asset| (asset.media_filename.clone(), asset.bytes.clone()))
            .collect();
        media.sort_by(|a, b| a.0.cmp(&b.0));
        media.dedup_by(|a, b| a.0 == b.0);

        let collection_path =
            std::env::temp_dir().join(format!("ankitab-{}.anki2", Uuid::new_v4()));
        let result: Result<(), AnkitabError> = (|| {
            collection::write_collection(
                &collection_path,
                &self.deck_name,
                deck_id,
                model_id,
                self.note_type,
                &notes,
            )?;
            package::write_apkg(&self.output_path, &collection_path, &media)
        })();
        let _ = fs::remove_file(&collection_path);
        result?;

        let summary = DeckSummary {
            notes_written: notes.len(),
            media_written: media.len(),
            duplicates_skipped,
        };
        println!(
            "Wrote deck '{}' to {}: {} notes, {} media files, {} duplicates skipped ({:.1}s)",
            self.deck_name,
            self.output_path.display(),
            summary.notes_written,
            summary.media_written,
            summary.duplicates_skipped,
            start.elapsed().as_secs_f32()
        );

        Ok(summary)
    }
}

fn bind_side(
    text: &str,
    language: &str,
    outcome: &SynthesisOutcome,
    skipped_pairs: &HashSet<(String, String)>,
) -> Result<Option<String>, AnkitabError> {
    let normalized = normalize_audio_text(text);
    if normalized.is_empty() {
        return Ok(None);
    }

    let key = (normalized, language.to_string());
    if let Some(asset) = outcome.assets.get(&key) {
        return Ok(Some(asset.media_filename.clone()));
    }
    if skipped_pairs.contains(&key) {
        return Ok(None);
    }
    Err(AnkitabError::Assembly(format!("no audio asset bound for '{}' ({})", text, language)))
}

use sha2::{
    Digest,
    Sha256,
};

use crate::core::{
    AnkitabError,
    LanguagePair,
    Note,
    NoteType,
    VocabEntry,
};

/// Normalization applied to the identifier tuple. Case and surrounding
/// whitespace must not change a note's identity across runs.
pub fn normalize_field(value: &str) -> String {
    value.trim().to_lowercase()
}

fn note_digest(front: &str, back: &str, front_language: &str, back_language: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(normalize_field(front).as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalize_field(back).as_bytes());
    hasher.update([0x1f]);
    hasher.update(front_language.as_bytes());
    hasher.update([0x1f]);
    hasher.update(back_language.as_bytes());
    hasher.finalize().into()
}

/// Deterministic note id, constrained to [2^43, 2^44) so derived card ids
/// (`note_id * 10 + ord`) stay well inside i64.
pub fn note_id(front: &str, back: &str, front_language: &str, back_language: &str) -> i64 {
    let digest = note_digest(front, back, front_language, back_language);
    let raw = u64::from_be_bytes(digest[..8].try_into().unwrap());
    ((raw % (1 << 43)) + (1 << 43)) as i64
}

/// Deterministic note guid; Anki merges re-imported notes by this value.
pub fn note_guid(front: &str, back: &str, front_language: &str, back_language: &str) -> String {
    let digest = note_digest(front, back, front_language, back_language);
    hex::encode(&digest[..8])
}

/// Maps ordered rows to ordered notes under the note-type policy. Each row
/// becomes exactly one note; for `ForwardOnly` the input is expected to
/// already carry the reverse direction as its own row when wanted.
pub fn expand_notes(
    rows: &[VocabEntry],
    note_type: NoteType,
    pair: &LanguagePair,
) -> Result<Vec<Note>, AnkitabError> {
    let mut notes = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        if !pair.matches(&row.front_language, &row.back_language) {
            return Err(AnkitabError::LanguageMismatch {
                row: idx + 1,
                front: row.front_language.clone(),
                back: row.back_language.clone(),
                pair: pair.to_string(),
            });
        }

        notes.push(Note {
            id: note_id(&row.front, &row.back, &row.front_language, &row.back_language),
            guid: note_guid(&row.front, &row.back, &row.front_language, &row.back_language),
            front: row.front.clone(),
            back: row.back.clone(),
            front_language: row.front_language.clone(),
            back_language: row.back_language.clone(),
            front_audio: None,
            back_audio: None,
            note_type,
        });
    }

    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(front: &str, back: &str, fl: &str, bl: &str) -> VocabEntry {
        VocabEntry {
            front: front.to_string(),
            back: back.to_string(),
            front_language: fl.to_string(),
            back_language: bl.to_string(),
        }
    }

    #[test]
    fn test_note_id_is_pure_over_normalization() {
        let a = note_id("Hallo", "Hello", "german", "english");
        let b = note_id("  hallo ", "HELLO", "german", "english");
        assert_eq!(a, b);

        let c = note_id("Hallo!", "Hello", "german", "english");
        assert_ne!(a, c);

        assert_eq!(
            note_guid("Hallo", "Hello", "german", "english"),
            note_guid(" hallo", "hello ", "german", "english"),
        );
    }

    #[test]
    fn test_one_note_per_row() {
        let pair = LanguagePair::new("german", "english");
        let rows = vec![
            row("Hallo", "Hello", "german", "english"),
            row("Hello", "Hallo", "english", "german"),
        ];

        let fb = expand_notes(&rows, NoteType::ForwardAndBackward, &pair).unwrap();
        assert_eq!(fb.len(), 2);

        let fo = expand_notes(&rows, NoteType::ForwardOnly, &pair).unwrap();
        assert_eq!(fo.len(), 2);
        assert_eq!(fo[0].front, "Hallo");
        assert_eq!(fo[1].front, "Hello");
    }

    #[test]
    fn test_language_mismatch_identifies_row() {
        let pair = LanguagePair::new("german", "english");
        let rows = vec![
            row("Hallo", "Hello", "german", "english"),
            row("Привет", "Hello", "russian", "english"),
        ];

        match expand_notes(&rows, NoteType::ForwardAndBackward, &pair) {
            Err(AnkitabError::LanguageMismatch { row, front, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(front, "russian");
            }
            other => panic!("Expected LanguageMismatch, got {:?}", other.map(|n| n.len())),
        }
    }

    #[test]
    fn test_reversed_orientation_is_accepted() {
        let pair = LanguagePair::new("german", "english");
        let rows = vec![row("Hello", "Hallo", "english", "german")];
        assert!(expand_notes(&rows, NoteType::ForwardOnly, &pair).is_ok());
    }

    #[test]
    fn test_note_ids_stable_across_runs() {
        let pair = LanguagePair::new("german", "english");
        let rows = vec![row("Hallo", "Hello", "german", "english")];

        let first = expand_notes(&rows, NoteType::ForwardAndBackward, &pair).unwrap();
        let second = expand_notes(&rows, NoteType::ForwardAndBackward, &pair).unwrap();
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].guid, second[0].guid);
    }
}

use std::{
    fs,
    path::Path,
};

use crate::core::{
    models::canonical_language,
    AnkitabError,
    VocabEntry,
};

/// Parses a tab-separated vocabulary table: 4 columns per row, no header.
/// Blank lines are skipped but still counted for line numbering. A line
/// with any other field count aborts the parse.
pub fn read_from_string(input: &str) -> Result<Vec<VocabEntry>, AnkitabError> {
    let mut entries = Vec::new();

    for (idx, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 4 {
            return Err(AnkitabError::MalformedRow { line: idx + 1, fields: fields.len() });
        }

        entries.push(VocabEntry {
            front: fields[0].trim().to_string(),
            back: fields[1].trim().to_string(),
            front_language: canonical_language(fields[2]),
            back_language: canonical_language(fields[3]),
        });
    }

    Ok(entries)
}

pub fn read_from_file(path: &Path) -> Result<Vec<VocabEntry>, AnkitabError> {
    let content = fs::read_to_string(path)?;
    read_from_string(&content)
}

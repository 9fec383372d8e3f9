use std::{
    path::PathBuf,
    sync::{
        atomic::AtomicBool,
        Arc,
    },
    time::Instant,
};

use crate::{
    core::{
        AnkitabError,
        DeckSummary,
        LanguagePair,
        MergeTarget,
        NoteType,
    },
    deck::DeckAssembler,
    notes::expand_notes,
    table,
    tts::{
        SkippedEntry,
        Synthesizer,
    },
};

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub deck_name: String,
    pub note_type: NoteType,
    pub language_pair: LanguagePair,
    pub output_path: PathBuf,
    /// Existing deck discovered by name; when set, its identifiers are
    /// reused instead of recomputed.
    pub merge_target: Option<MergeTarget>,
    /// Drop notes the merge target already knows.
    pub dedup_existing: bool,
}

#[derive(Debug)]
pub struct CompileReport {
    pub summary: DeckSummary,
    pub skipped: Vec<SkippedEntry>,
    pub provider_calls: usize,
    pub cache_hits: usize,
}

/// Runs the full compile: parse -> expand -> synthesize -> assemble.
/// No partial deck is ever written to the output path; any failure
/// aborts before the artifact is committed.
pub async fn compile_table(
    tsv: &str,
    options: &CompileOptions,
    synthesizer: &Synthesizer,
    cancel_flag: Option<Arc<AtomicBool>>,
) -> Result<CompileReport, AnkitabError> {
    let total_start = Instant::now();

    let rows = table::read_from_string(tsv)?;
    println!("Parsed {} vocabulary rows", rows.len());

    let notes = expand_notes(&rows, options.note_type, &options.language_pair)?;

    let outcome = synthesizer.synthesize_notes(&notes, cancel_flag).await?;

    let assembler = DeckAssembler::new(&options.deck_name, options.note_type, &options.output_path);
    let summary =
        assembler.assemble(notes, &outcome, options.merge_target.as_ref(), options.dedup_existing)?;

    println!("Compile completed ({:.1}s)", total_start.elapsed().as_secs_f32());

    Ok(CompileReport {
        summary,
        skipped: outcome.skipped,
        provider_calls: outcome.provider_calls,
        cache_hits: outcome.cache_hits,
    })
}

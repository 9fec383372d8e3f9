pub mod core;
pub mod deck;
pub mod notes;
pub mod persistence;
pub mod table;
pub mod tts;

pub use crate::core::{
    pipeline::{
        compile_table,
        CompileOptions,
        CompileReport,
    },
    AnkitabError,
    AudioAsset,
    DeckSummary,
    LanguagePair,
    MergeTarget,
    Note,
    NoteType,
    VocabEntry,
};
pub use tts::{
    cache::AudioCache,
    provider::{
        ProviderAccessConfig,
        ProviderKind,
        TtsProvider,
    },
    Synthesizer,
    TtsConfig,
};

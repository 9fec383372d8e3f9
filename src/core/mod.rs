pub mod errors;
pub mod models;
pub mod pipeline;

pub use errors::AnkitabError;
pub use models::{ AudioAsset, DeckSummary, LanguagePair, MergeTarget, Note, NoteType, VocabEntry };

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnkitabError {
    #[error("I/O error: {0}")]
    Io(Box<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Reqwest error: {0}")]
    Reqwest(Box<reqwest::Error>),

    #[error("Database error: {0}")]
    Sqlite(Box<rusqlite::Error>),

    #[error("Zip error: {0}")]
    Zip(Box<zip::result::ZipError>),

    #[error("line {line}: expected 4 tab-separated fields, found {fields}")]
    MalformedRow { line: usize, fields: usize },

    #[error("row {row}: languages '{front}'/'{back}' do not match the configured pair '{pair}'")]
    LanguageMismatch { row: usize, front: String, back: String, pair: String },

    #[error("synthesis failed for '{text}' ({language}) via '{provider}': {reason}")]
    Synthesis { text: String, language: String, provider: String, reason: String },

    #[error("deck assembly failed: {0}")]
    Assembly(String),

    #[error("compile cancelled")]
    Cancelled,

    #[error("AnkitabError: {0}")]
    Custom(String),
}

impl From<std::io::Error> for AnkitabError {
    fn from(error: std::io::Error) -> Self {
        AnkitabError::Io(Box::new(error))
    }
}

impl From<reqwest::Error> for AnkitabError {
    fn from(error: reqwest::Error) -> Self {
        AnkitabError::Reqwest(Box::new(error))
    }
}

impl From<rusqlite::Error> for AnkitabError {
    fn from(error: rusqlite::Error) -> Self {
        AnkitabError::Sqlite(Box::new(error))
    }
}

impl From<zip::result::ZipError> for AnkitabError {
    fn from(error: zip::result::ZipError) -> Self {
        AnkitabError::Zip(Box::new(error))
    }
}

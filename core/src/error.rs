use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extractor request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extractor returned HTTP {status}: {body}")]
    ExtractorStatus { status: u16, body: String },

    #[error("extractor response could not be parsed: {0}")]
    ExtractorResponse(String),

    #[error("invalid phrase pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("snapshot {path} is unreadable: {message}")]
    Snapshot { path: PathBuf, message: String },

    #[error("snapshot is invalid: {0}")]
    InvalidSnapshot(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid glob `{pattern}`: {message}")]
    Glob { pattern: String, message: String },

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

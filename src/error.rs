use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Missing required table: {0}")]
    MissingTable(String),

    #[error("Missing required element: {0}")]
    MissingElement(String),

    #[error("Malformed {table} record at line {line}: {reason}")]
    MalformedRecord {
        table: String,
        line: usize,
        reason: String,
    },

    #[error("Invalid date '{value}': {source}")]
    Date {
        value: String,
        source: chrono::ParseError,
    },

    #[error("Invalid number: {0}")]
    Number(String),

    #[error("XML syntax error at offset {offset}: {message}")]
    Xml { offset: usize, message: String },

    #[error("Unsupported file format: {0}")]
    UnknownFormat(String),

    #[error("No home directory")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, Error>;

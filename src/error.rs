use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeozonesError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source error for {url}: {message}")]
    Source { url: String, message: String },

    #[error("Knowledge graph error: {message}")]
    KnowledgeGraph { message: String },

    #[error("Store error: {message}")]
    Store { message: String },
}

pub type Result<T> = std::result::Result<T, GeozonesError>;

use thiserror::Error;

/// Failures while producing an attribute set.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read file {path}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {attribute} from {location}: {reason}")]
    ParseError {
        attribute: String,
        location: String,
        reason: String,
    },

    #[error("Invalid format in {location}: {reason}")]
    InvalidFormat { location: String, reason: String },

    /// The collected value could not be turned into attributes.
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unsupported source: {0}")]
    Unsupported(String),
}

//! Error types for the map-aggregation server.

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration serialization error
    #[error("Config write error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Submap folder exists but its content cannot be used
    #[error("Invalid submap: {0}")]
    InvalidSubmap(String),

    /// Pipeline command identifier not known to the engine
    #[error("Unknown pipeline command: {0}")]
    UnknownCommand(String),

    /// Pipeline command resolved but failed during execution
    #[error("Command '{command}' failed: {message}")]
    CommandFailed {
        /// The command identifier
        command: String,
        /// Failure description from the engine
        message: String,
    },

    /// Engine rejected a merge
    #[error("Merge failed: {0}")]
    MergeFailed(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

use deckgen_core::ResolveError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// File exists but is not valid JSON, or has the wrong top-level shape.
    /// Deliberately distinct from a missing file, which is a soft miss.
    #[error("malformed data at {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl StoreError {
    /// Lift into the resolver error space, naming the source being resolved.
    pub fn into_resolve(self, name: &str) -> ResolveError {
        match self {
            StoreError::Malformed { message, .. } => ResolveError::DataFormat {
                name: name.to_string(),
                message,
            },
            StoreError::Serialization(message) => ResolveError::DataFormat {
                name: name.to_string(),
                message,
            },
            StoreError::Io(message) => ResolveError::Io {
                name: name.to_string(),
                message,
            },
        }
    }
}

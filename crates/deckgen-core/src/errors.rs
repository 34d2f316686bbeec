/// Errors surfaced while resolving named data sources.
///
/// Missing backing files are deliberately NOT represented here: a missing file
/// resolves to an empty mapping and stays invisible to callers. Only
/// present-but-broken data and wiring mistakes abort a report run.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("malformed data in '{name}': {message}")]
    DataFormat { name: String, message: String },

    #[error("circular dependency: source '{0}' requested while its producer is running")]
    CircularDependency(String),

    #[error("no producer registered for source '{0}'")]
    NoProducer(String),

    #[error("io error reading '{name}': {message}")]
    Io { name: String, message: String },
}

impl ResolveError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::DataFormat { .. } => "data_format",
            Self::CircularDependency(_) => "circular_dependency",
            Self::NoProducer(_) => "no_producer",
            Self::Io { .. } => "io",
        }
    }

    /// True when the error means the backing data itself is corrupt, as
    /// opposed to a wiring mistake in the source catalog.
    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::DataFormat { .. } | Self::Io { .. })
    }
}

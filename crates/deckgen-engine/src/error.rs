use deckgen_core::ResolveError;
use deckgen_render::RenderError;
use deckgen_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),
}

impl EngineError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Resolve(e) => e.error_kind(),
            Self::Store(_) => "store",
            Self::Render(e) => e.error_kind(),
        }
    }
}

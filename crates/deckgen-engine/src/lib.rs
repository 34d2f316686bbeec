pub mod alias;
pub mod assembler;
pub mod cache;
pub mod error;
pub mod import;
pub mod registry;
pub mod sections;
pub mod sources;

pub use alias::AliasResolver;
pub use assembler::{AssembledDeck, ReportAssembler};
pub use cache::SourceCache;
pub use error::EngineError;
pub use import::ExcelImporter;
pub use registry::{Producer, SourceRegistry};

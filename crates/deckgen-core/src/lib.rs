pub mod errors;
pub mod ids;
pub mod sections;
pub mod slides;

/// The universal payload shape: a JSON object preserving insertion order.
/// Insertion order matters: text pagination and first-seen grouping both
/// follow the order keys appear in the backing document.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

pub use errors::ResolveError;
pub use ids::RunId;
pub use sections::{apply_page_limit, Section, SourceReader};
pub use slides::{
    chart_font, scheme_color, ChartBlock, ChartKind, ChartSeries, ReportMeta, SlideDescriptor,
    TableBlock, TextLine, TextStyle,
};

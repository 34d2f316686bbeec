use std::sync::Arc;

use crate::errors::ResolveError;
use crate::slides::SlideDescriptor;
use crate::JsonMap;

/// Read access to resolved sources. Implemented by the engine's registry;
/// the trait seam keeps section composers independent of how resolution and
/// caching actually happen.
pub trait SourceReader: Send + Sync {
    /// Resolve a source by name. Missing backing data yields an empty mapping,
    /// never an error.
    fn read(&self, name: &str) -> Result<Arc<JsonMap>, ResolveError>;
}

/// One unit of report content. A section reads exactly one resolved source
/// (or a derived projection of one) and turns it into zero or more slides.
///
/// Sections are constructed per report run and never mutated afterwards; a
/// fresh object is required for every run.
pub trait Section: Send + Sync {
    /// Section title, repeated on every slide the section emits.
    fn title(&self) -> &str;

    /// Name of the source this section reads.
    fn data_key(&self) -> &str;

    /// Optional cap on emitted slides, for test/demo truncation.
    fn page_limit(&self) -> Option<usize> {
        None
    }

    /// Produce the section's slides from resolved data.
    fn compose(&self, reader: &dyn SourceReader) -> Result<Vec<SlideDescriptor>, ResolveError>;
}

/// Apply a section's page limit to its composed slides.
pub fn apply_page_limit(section: &dyn Section, mut slides: Vec<SlideDescriptor>) -> Vec<SlideDescriptor> {
    if let Some(limit) = section.page_limit() {
        slides.truncate(limit);
    }
    slides
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSection {
        count: usize,
        limit: Option<usize>,
    }

    impl Section for FixedSection {
        fn title(&self) -> &str {
            "fixed"
        }
        fn data_key(&self) -> &str {
            "internal_database"
        }
        fn page_limit(&self) -> Option<usize> {
            self.limit
        }
        fn compose(
            &self,
            _reader: &dyn SourceReader,
        ) -> Result<Vec<SlideDescriptor>, ResolveError> {
            Ok((0..self.count)
                .map(|i| SlideDescriptor::titled(format!("slide {i}")))
                .collect())
        }
    }

    struct EmptyReader;

    impl SourceReader for EmptyReader {
        fn read(&self, _name: &str) -> Result<Arc<JsonMap>, ResolveError> {
            Ok(Arc::new(JsonMap::new()))
        }
    }

    #[test]
    fn page_limit_truncates() {
        let section = FixedSection {
            count: 5,
            limit: Some(2),
        };
        let slides = section.compose(&EmptyReader).unwrap();
        let slides = apply_page_limit(&section, slides);
        assert_eq!(slides.len(), 2);
    }

    #[test]
    fn no_limit_passes_all_slides() {
        let section = FixedSection {
            count: 5,
            limit: None,
        };
        let slides = section.compose(&EmptyReader).unwrap();
        let slides = apply_page_limit(&section, slides);
        assert_eq!(slides.len(), 5);
    }
}

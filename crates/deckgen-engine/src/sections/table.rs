use serde_json::Value;

use deckgen_core::{ResolveError, Section, SlideDescriptor, SourceReader, TableBlock};

use super::{RANKING_TITLES, TABLE_ROWS_PER_SLIDE};

/// Top/bottom ranking table: the source maps each indicator to a ranked list
/// of unit entries (objects carrying `unitName`). One row per indicator;
/// indicators with no ranked entries are dropped. Ten rows per slide, header
/// repeated on each.
pub struct RankingTableSection {
    title: String,
    data_key: String,
    titles: Vec<String>,
    rows_per_slide: usize,
    page_limit: Option<usize>,
}

impl RankingTableSection {
    pub fn new(title: impl Into<String>, data_key: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            data_key: data_key.into(),
            titles: RANKING_TITLES.iter().map(|t| t.to_string()).collect(),
            rows_per_slide: TABLE_ROWS_PER_SLIDE,
            page_limit: None,
        }
    }

    /// Replace the default ranking header row.
    pub fn with_titles(mut self, titles: Vec<String>) -> Self {
        self.titles = titles;
        self
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }
}

impl Section for RankingTableSection {
    fn title(&self) -> &str {
        &self.title
    }

    fn data_key(&self) -> &str {
        &self.data_key
    }

    fn page_limit(&self) -> Option<usize> {
        self.page_limit
    }

    fn compose(&self, reader: &dyn SourceReader) -> Result<Vec<SlideDescriptor>, ResolveError> {
        let data = reader.read(&self.data_key)?;

        let mut rows: Vec<Vec<String>> = Vec::new();
        for (indicator, ranked) in data.iter() {
            let Some(entries) = ranked.as_array() else {
                continue;
            };
            let mut row = vec![indicator.clone()];
            row.extend(
                entries
                    .iter()
                    .filter_map(|e| e.get("unitName").and_then(Value::as_str))
                    .map(str::to_owned),
            );
            if row.len() > 1 {
                rows.push(row);
            }
        }

        let slides = rows
            .chunks(self.rows_per_slide)
            .map(|page| {
                SlideDescriptor::titled(&self.title).with_table(TableBlock {
                    headers: self.titles.clone(),
                    rows: page.to_vec(),
                })
            })
            .collect();
        Ok(slides)
    }
}

use regex::Regex;
use serde_json::Value;

use deckgen_core::{
    ChartBlock, ChartKind, ChartSeries, JsonMap, ResolveError, Section, SlideDescriptor,
    SourceReader,
};

use super::{shorten_label, MAX_CHART_ENTRIES};

/// Chart section: reads a database-shaped source (unit -> fields) and plots
/// one indicator across units, one series per requested key (typically year
/// keys). Radar charts carry all series on one chart for overlay comparison.
pub struct ChartSection {
    title: String,
    data_key: String,
    kind: ChartKind,
    indicator: String,
    /// One series per key, drilled into the indicator's value object. Empty
    /// means the indicator's value is the number itself.
    series_keys: Vec<String>,
    /// Units matching this pattern (totals, aggregates) are excluded.
    except: Option<Regex>,
    options: JsonMap,
    page_limit: Option<usize>,
}

impl ChartSection {
    pub fn new(
        title: impl Into<String>,
        data_key: impl Into<String>,
        kind: ChartKind,
        indicator: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            data_key: data_key.into(),
            kind,
            indicator: indicator.into(),
            series_keys: Vec::new(),
            except: None,
            options: JsonMap::new(),
            page_limit: None,
        }
    }

    pub fn with_series_keys(mut self, keys: Vec<String>) -> Self {
        self.series_keys = keys;
        self
    }

    pub fn with_except(mut self, pattern: Regex) -> Self {
        self.except = Some(pattern);
        self
    }

    pub fn with_options(mut self, options: JsonMap) -> Self {
        self.options = options;
        self
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    fn series_for(&self, database: &JsonMap, key: Option<&str>) -> ChartSeries {
        let mut labels = Vec::new();
        let mut values = Vec::new();
        for (unit, fields) in database {
            if labels.len() == MAX_CHART_ENTRIES {
                break;
            }
            if let Some(pattern) = &self.except {
                if pattern.is_match(unit) {
                    continue;
                }
            }
            let field = fields.get(&self.indicator);
            let number = match (key, field) {
                (Some(k), Some(Value::Object(inner))) => inner.get(k).and_then(Value::as_f64),
                (None, Some(v)) => v.as_f64(),
                _ => None,
            };
            if let Some(n) = number {
                labels.push(shorten_label(unit));
                values.push(n);
            }
        }
        ChartSeries {
            name: key.unwrap_or(&self.indicator).to_string(),
            labels,
            values,
        }
    }
}

impl Section for ChartSection {
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
        let database = reader.read(&self.data_key)?;

        let series: Vec<ChartSeries> = if self.series_keys.is_empty() {
            vec![self.series_for(&database, None)]
        } else {
            self.series_keys
                .iter()
                .map(|key| self.series_for(&database, Some(key.as_str())))
                .collect()
        };
        let series: Vec<ChartSeries> = series.into_iter().filter(|s| !s.values.is_empty()).collect();
        if series.is_empty() {
            return Ok(Vec::new());
        }

        let chart = ChartBlock {
            kind: self.kind,
            title: self.indicator.clone(),
            series,
            options: self.options.clone(),
        };
        Ok(vec![SlideDescriptor::titled(&self.title).with_chart(chart)])
    }
}

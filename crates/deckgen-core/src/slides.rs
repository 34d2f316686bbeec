use serde::{Deserialize, Serialize};

use crate::JsonMap;

/// Metadata for one report, read out of the project-settings document with
/// fixed fallbacks when the project-info block is absent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReportMeta {
    pub project_name: String,
    pub customer_name: String,
    pub final_year: i32,
    pub is_hospital: bool,
}

impl ReportMeta {
    pub const DEFAULT_FINAL_YEAR: i32 = 2021;
    pub const DEFAULT_CUSTOMER_NAME: &'static str = "Good Hospital";

    /// Year key used throughout the databases: "Y2021", "Y2020", ...
    /// `offset` counts back from the final year.
    pub fn year_key(&self, offset: i32) -> String {
        format!("Y{}", self.final_year - offset)
    }

    pub fn deck_title(&self) -> String {
        format!("{}运营分析报告", self.customer_name)
    }

    pub fn deck_subtitle(&self) -> String {
        format!("{}年度数据分析", self.final_year)
    }
}

impl Default for ReportMeta {
    fn default() -> Self {
        Self {
            project_name: "医院运营分析".into(),
            customer_name: Self::DEFAULT_CUSTOMER_NAME.into(),
            final_year: Self::DEFAULT_FINAL_YEAR,
            is_hospital: true,
        }
    }
}

/// Style attributes attached to one styled text line.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TextStyle {
    pub font_size: u32,
    pub bold: bool,
    pub break_line: bool,
}

impl TextStyle {
    /// Bold 16pt header line above each text entry.
    pub fn header() -> Self {
        Self {
            font_size: 16,
            bold: true,
            break_line: true,
        }
    }

    /// Regular 12pt body line.
    pub fn body() -> Self {
        Self {
            font_size: 12,
            bold: false,
            break_line: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub style: TextStyle,
}

impl TextLine {
    pub fn header(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::header(),
        }
    }

    pub fn body(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: TextStyle::body(),
        }
    }
}

/// Chart kinds understood by the external renderer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Radar,
    Scatter,
}

/// One labeled numeric series. Radar charts carry several of these for
/// multi-department overlays.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChartBlock {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub title: String,
    pub series: Vec<ChartSeries>,
    /// Positional/sizing options passed through to the renderer untouched.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub options: JsonMap,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TableBlock {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The renderer-agnostic description of one slide. Immutable once produced;
/// the assembler only ever appends these to the deck.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SlideDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_lines: Vec<TextLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableBlock>,
}

impl SlideDescriptor {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// The title slide that opens every deck.
    pub fn title_slide(meta: &ReportMeta) -> Self {
        Self {
            title: Some(meta.deck_title()),
            content: Some(meta.deck_subtitle()),
            ..Self::default()
        }
    }

    pub fn with_text_lines(mut self, lines: Vec<TextLine>) -> Self {
        self.text_lines = lines;
        self
    }

    pub fn with_chart(mut self, chart: ChartBlock) -> Self {
        self.chart = Some(chart);
        self
    }

    pub fn with_table(mut self, table: TableBlock) -> Self {
        self.table = Some(table);
        self
    }
}

/// Theme colors carried as renderer options (hex, no leading '#').
pub mod scheme_color {
    pub const TEXT1: &str = "363636";
    pub const TEXT2: &str = "666666";
    pub const BACKGROUND1: &str = "FFFFFF";
    pub const BACKGROUND2: &str = "F5F5F5";
    pub const ACCENT1: &str = "4472C4";
    pub const ACCENT2: &str = "ED7D31";
    pub const ACCENT3: &str = "A5A5A5";
}

/// Chart font sizes, in points.
pub mod chart_font {
    pub const TITLE: u32 = 12;
    pub const LEGEND: u32 = 5;
    pub const DATA_LABEL: u32 = 5;
    pub const CAT_AXIS_LABEL: u32 = 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_defaults_match_fallbacks() {
        let meta = ReportMeta::default();
        assert_eq!(meta.customer_name, "Good Hospital");
        assert_eq!(meta.final_year, 2021);
        assert!(meta.is_hospital);
    }

    #[test]
    fn year_keys_count_back() {
        let meta = ReportMeta {
            final_year: 2021,
            ..ReportMeta::default()
        };
        assert_eq!(meta.year_key(0), "Y2021");
        assert_eq!(meta.year_key(1), "Y2020");
        assert_eq!(meta.year_key(2), "Y2019");
    }

    #[test]
    fn chart_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ChartKind::Bar).unwrap(), r#""bar""#);
        assert_eq!(
            serde_json::to_string(&ChartKind::Radar).unwrap(),
            r#""radar""#
        );
    }

    #[test]
    fn chart_block_uses_type_field() {
        let chart = ChartBlock {
            kind: ChartKind::Pie,
            title: "药占比".into(),
            series: vec![ChartSeries {
                name: "Y2021".into(),
                labels: vec!["内科".into()],
                values: vec![32.1],
            }],
            options: JsonMap::new(),
        };
        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["type"], "pie");
        assert_eq!(json["series"][0]["values"][0], 32.1);
        assert!(json.get("options").is_none());
    }

    #[test]
    fn empty_slide_fields_are_omitted() {
        let slide = SlideDescriptor::titled("科室排名");
        let json = serde_json::to_value(&slide).unwrap();
        assert_eq!(json["title"], "科室排名");
        assert!(json.get("content").is_none());
        assert!(json.get("chart").is_none());
        assert!(json.get("table").is_none());
        assert!(json.get("text_lines").is_none());
    }

    #[test]
    fn title_slide_combines_customer_and_year() {
        let meta = ReportMeta {
            customer_name: "仁济医院".into(),
            final_year: 2023,
            ..ReportMeta::default()
        };
        let slide = SlideDescriptor::title_slide(&meta);
        assert_eq!(slide.title.as_deref(), Some("仁济医院运营分析报告"));
        assert_eq!(slide.content.as_deref(), Some("2023年度数据分析"));
    }
}

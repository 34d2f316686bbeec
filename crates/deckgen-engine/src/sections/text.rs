use deckgen_core::{ResolveError, Section, SlideDescriptor, SourceReader, TextLine};

use super::TEXT_LINES_PER_SLIDE;

/// Narrative section: the source maps indicator names to descriptive text.
/// Every entry becomes a bold header line followed by one body line per line
/// of text, paginated onto slides in document order.
pub struct TextSection {
    title: String,
    data_key: String,
    lines_per_slide: usize,
    page_limit: Option<usize>,
}

impl TextSection {
    pub fn new(title: impl Into<String>, data_key: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            data_key: data_key.into(),
            lines_per_slide: TEXT_LINES_PER_SLIDE,
            page_limit: None,
        }
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    #[cfg(test)]
    fn with_lines_per_slide(mut self, lines: usize) -> Self {
        self.lines_per_slide = lines;
        self
    }
}

impl Section for TextSection {
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

        let mut lines: Vec<TextLine> = Vec::new();
        for (indicator, value) in data.iter() {
            let Some(text) = value.as_str() else {
                continue;
            };
            lines.push(TextLine::header(indicator));
            if text.is_empty() {
                lines.push(TextLine::body(""));
            } else {
                for body in text.lines() {
                    lines.push(TextLine::body(body));
                }
            }
        }

        let slides = lines
            .chunks(self.lines_per_slide)
            .map(|page| SlideDescriptor::titled(&self.title).with_text_lines(page.to_vec()))
            .collect();
        Ok(slides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckgen_core::JsonMap;
    use serde_json::Value;
    use std::sync::Arc;

    struct OneDoc(JsonMap);

    impl SourceReader for OneDoc {
        fn read(&self, _name: &str) -> Result<Arc<JsonMap>, ResolveError> {
            Ok(Arc::new(self.0.clone()))
        }
    }

    #[test]
    fn entries_become_header_and_body_lines_in_document_order() {
        let data = serde_json::from_str::<JsonMap>(
            r#"{"药占比": "有2个科室药占比指标须改进。", "平均住院日": "有4个科室平均住院日指标须改进。"}"#,
        )
        .unwrap();
        let section = TextSection::new("三级指标数据统计分析", "analysis");
        let slides = section.compose(&OneDoc(data)).unwrap();

        assert_eq!(slides.len(), 1);
        let lines = &slides[0].text_lines;
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].text, "药占比");
        assert!(lines[0].style.bold);
        assert_eq!(lines[0].style.font_size, 16);
        assert_eq!(lines[1].text, "有2个科室药占比指标须改进。");
        assert!(!lines[1].style.bold);
        assert_eq!(lines[1].style.font_size, 12);
        assert_eq!(lines[2].text, "平均住院日");
    }

    #[test]
    fn thirty_seven_lines_paginate_as_15_15_7() {
        // 12 single-line entries (24 lines) plus one entry whose body spans
        // 12 lines: 24 + 1 + 12 = 37 styled lines.
        let mut data = JsonMap::new();
        for i in 0..12 {
            let _ = data.insert(format!("指标{i}"), Value::from("一行说明"));
        }
        let long_body = vec!["行"; 12].join("\n");
        let _ = data.insert("长指标".into(), Value::from(long_body));

        let section = TextSection::new("统计分析", "analysis");
        let slides = section.compose(&OneDoc(data)).unwrap();

        let counts: Vec<usize> = slides.iter().map(|s| s.text_lines.len()).collect();
        assert_eq!(counts, [15, 15, 7]);
        for slide in &slides {
            assert_eq!(slide.title.as_deref(), Some("统计分析"));
        }
    }

    #[test]
    fn empty_source_emits_no_slides() {
        let section = TextSection::new("统计分析", "analysis");
        let slides = section.compose(&OneDoc(JsonMap::new())).unwrap();
        assert!(slides.is_empty());
    }

    #[test]
    fn non_string_entries_are_skipped() {
        let data = serde_json::from_str::<JsonMap>(r#"{"a": "文本", "b": 3, "c": {"x": 1}}"#).unwrap();
        let section = TextSection::new("t", "analysis");
        let slides = section.compose(&OneDoc(data)).unwrap();
        assert_eq!(slides[0].text_lines.len(), 2);
    }

    #[test]
    fn small_page_size_still_fills_in_sequence() {
        let data =
            serde_json::from_str::<JsonMap>(r#"{"a": "一", "b": "二", "c": "三"}"#).unwrap();
        let section = TextSection::new("t", "analysis").with_lines_per_slide(4);
        let slides = section.compose(&OneDoc(data)).unwrap();
        let counts: Vec<usize> = slides.iter().map(|s| s.text_lines.len()).collect();
        assert_eq!(counts, [4, 2]);
    }
}

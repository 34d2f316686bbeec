use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use deckgen_core::{apply_page_limit, ReportMeta, RunId, Section, SlideDescriptor};
use deckgen_render::{RenderRequest, Renderer};
use deckgen_telemetry::MetricsRecorder;

use crate::error::EngineError;
use crate::registry::SourceRegistry;
use crate::sources::{report_meta, PROJECT_SETTINGS};

/// The finished deck: the title slide plus every section's slides in
/// registration order, alongside the metadata the title slide was built from.
#[derive(Debug)]
pub struct AssembledDeck {
    pub run_id: RunId,
    pub meta: ReportMeta,
    pub slides: Vec<SlideDescriptor>,
}

impl AssembledDeck {
    /// Slides after the title prologue. Empty when the deck holds at most
    /// the title slide.
    pub fn content_slides(&self) -> &[SlideDescriptor] {
        self.slides.get(1..).unwrap_or_default()
    }
}

/// Orders sections into the final slide sequence. Does no pagination or
/// reformatting of its own: one title slide, then pure concatenation.
pub struct ReportAssembler {
    registry: Arc<SourceRegistry>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl ReportAssembler {
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Resolve every source, then compose each section in order.
    pub fn assemble(&self, sections: &[Box<dyn Section>]) -> Result<AssembledDeck, EngineError> {
        let run_id = RunId::new();
        let started = Instant::now();
        info!(run_id = %run_id, sections = sections.len(), "assembling report");

        // One topological pass settles force-reload marks and fills the cache
        // before any section reads.
        self.registry.resolve_all()?;

        let settings = self.registry.resolve(PROJECT_SETTINGS)?;
        let meta = report_meta(&settings);

        let mut slides = vec![SlideDescriptor::title_slide(&meta)];
        for section in sections {
            let composed = section.compose(self.registry.as_ref())?;
            let composed = apply_page_limit(section.as_ref(), composed);
            info!(
                run_id = %run_id,
                section = section.title(),
                source = section.data_key(),
                slides = composed.len(),
                "section composed"
            );
            if let Some(metrics) = &self.metrics {
                metrics.counter_inc(
                    "deck_slides_composed",
                    &[("section", section.title())],
                    composed.len() as u64,
                );
            }
            slides.extend(composed);
        }

        if let Some(metrics) = &self.metrics {
            metrics.histogram_observe(
                "deck_assemble_seconds",
                &[],
                started.elapsed().as_secs_f64(),
            );
        }
        info!(run_id = %run_id, total = slides.len(), "report assembled");
        Ok(AssembledDeck {
            run_id,
            meta,
            slides,
        })
    }

    /// Assemble, then hand the deck to the renderer. The render result is
    /// inspected for success only; diagnostics pass through verbatim.
    pub async fn assemble_and_render(
        &self,
        sections: &[Box<dyn Section>],
        renderer: &dyn Renderer,
        output_path: impl Into<std::path::PathBuf>,
    ) -> Result<AssembledDeck, EngineError> {
        let deck = self.assemble(sections)?;

        let mut request = RenderRequest::new(deck.slides.clone(), output_path);
        request.title = deck.meta.deck_title();
        request.author = deck.meta.customer_name.clone();

        let started = Instant::now();
        renderer.render(&request).await?;
        if let Some(metrics) = &self.metrics {
            metrics.histogram_observe(
                "deck_render_seconds",
                &[],
                started.elapsed().as_secs_f64(),
            );
        }
        info!(run_id = %deck.run_id, path = %request.output_path.display(), "deck rendered");
        Ok(deck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::{RankingTableSection, TextSection};
    use crate::sources::{basename, register_builtin_sources};
    use deckgen_core::{JsonMap, ResolveError, SourceReader};
    use deckgen_render::MockRenderer;
    use deckgen_store::{FileLayout, ValueStore};
    use tempfile::TempDir;

    fn write_doc(dir: &TempDir, name: &str, content: &str) {
        let json_dir = dir.path().join("data").join("JSON");
        std::fs::create_dir_all(&json_dir).unwrap();
        std::fs::write(json_dir.join(format!("{name}.json")), content).unwrap();
    }

    fn registry_in(dir: &TempDir) -> Arc<SourceRegistry> {
        let store = Arc::new(ValueStore::new(FileLayout::rooted_at(dir.path())));
        let registry = Arc::new(SourceRegistry::new());
        register_builtin_sources(&registry, store, None);
        registry
    }

    struct EchoSection {
        title: String,
        count: usize,
        limit: Option<usize>,
    }

    impl Section for EchoSection {
        fn title(&self) -> &str {
            &self.title
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
                .map(|i| SlideDescriptor::titled(format!("{} {i}", self.title)))
                .collect())
        }
    }

    #[test]
    fn title_slide_then_sections_in_order() {
        let dir = TempDir::new().unwrap();
        let assembler = ReportAssembler::new(registry_in(&dir));

        let sections: Vec<Box<dyn Section>> = vec![
            Box::new(EchoSection {
                title: "甲".into(),
                count: 2,
                limit: None,
            }),
            Box::new(EchoSection {
                title: "乙".into(),
                count: 1,
                limit: None,
            }),
        ];
        let deck = assembler.assemble(&sections).unwrap();

        assert_eq!(deck.slides.len(), 4);
        assert_eq!(
            deck.slides[0].title.as_deref(),
            Some("Good Hospital运营分析报告")
        );
        assert_eq!(deck.slides[1].title.as_deref(), Some("甲 0"));
        assert_eq!(deck.slides[3].title.as_deref(), Some("乙 0"));
        assert_eq!(deck.content_slides().len(), 3);
    }

    #[test]
    fn page_limits_apply_per_section() {
        let dir = TempDir::new().unwrap();
        let assembler = ReportAssembler::new(registry_in(&dir));

        let sections: Vec<Box<dyn Section>> = vec![Box::new(EchoSection {
            title: "甲".into(),
            count: 9,
            limit: Some(3),
        })];
        let deck = assembler.assemble(&sections).unwrap();
        assert_eq!(deck.content_slides().len(), 3);
    }

    #[test]
    fn content_slides_on_a_slideless_deck_are_empty() {
        let deck = AssembledDeck {
            run_id: RunId::new(),
            meta: ReportMeta::default(),
            slides: Vec::new(),
        };
        assert!(deck.content_slides().is_empty());
    }

    #[test]
    fn metadata_comes_from_project_settings_with_fallbacks() {
        let dir = TempDir::new().unwrap();
        write_doc(
            &dir,
            basename::PROJECT_SETTINGS,
            r#"{"项目信息": {"customerName": {"数据资料": "仁济医院"}, "finalYear": {"数据资料": 2022}}}"#,
        );
        let assembler = ReportAssembler::new(registry_in(&dir));
        let deck = assembler.assemble(&[]).unwrap();

        assert_eq!(deck.meta.customer_name, "仁济医院");
        assert_eq!(deck.meta.final_year, 2022);
        assert!(deck.meta.is_hospital);
        assert_eq!(deck.slides[0].title.as_deref(), Some("仁济医院运营分析报告"));
    }

    #[test]
    fn empty_sections_emit_nothing_past_the_title() {
        let dir = TempDir::new().unwrap();
        let assembler = ReportAssembler::new(registry_in(&dir));

        let sections: Vec<Box<dyn Section>> = vec![
            Box::new(TextSection::new("统计分析", "indicator_direction")),
            Box::new(RankingTableSection::new("科室排名", "l2_to_l3_map")),
        ];
        let deck = assembler.assemble(&sections).unwrap();
        assert_eq!(deck.slides.len(), 1);
    }

    #[tokio::test]
    async fn render_failures_carry_diagnostics() {
        let dir = TempDir::new().unwrap();
        let assembler = ReportAssembler::new(registry_in(&dir));
        let renderer = MockRenderer::failing("pptxgenjs: bad chart spec");

        let err = assembler
            .assemble_and_render(&[], &renderer, dir.path().join("out.pg.pptx"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad chart spec"), "got: {err}");
    }

    #[tokio::test]
    async fn successful_render_receives_the_whole_deck() {
        let dir = TempDir::new().unwrap();
        let assembler = ReportAssembler::new(registry_in(&dir));
        let renderer = MockRenderer::succeeding();

        let sections: Vec<Box<dyn Section>> = vec![Box::new(EchoSection {
            title: "甲".into(),
            count: 2,
            limit: None,
        })];
        let deck = assembler
            .assemble_and_render(&sections, &renderer, dir.path().join("out.pg.pptx"))
            .await
            .unwrap();

        let requests = renderer.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].slides.len(), deck.slides.len());
        assert_eq!(requests[0].title, "Good Hospital运营分析报告");
    }
}

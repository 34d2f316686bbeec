use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use deckgen_core::{chart_font, scheme_color, JsonMap, ReportMeta, Section};
use deckgen_engine::sections::{ChartSection, RankingTableSection, TextSection};
use deckgen_engine::sources::{self, register_builtin_sources, register_document_source};
use deckgen_engine::{AliasResolver, ExcelImporter, ReportAssembler, SourceRegistry};
use deckgen_render::contract::GENERATOR_TAG;
use deckgen_render::{ExcelBridge, NodeConfig, NodeRenderer, NodeRunner, ReadOptions};
use deckgen_store::{DocLocation, FileLayout, ValueStore};
use deckgen_telemetry::{init_telemetry, TelemetryConfig};

/// Assemble a hospital-performance report deck and render it to PPTX.
#[derive(Parser, Debug)]
#[command(name = "deckgen", version, about)]
struct Args {
    /// Case directory holding data/JSON and outputs/PPT.
    #[arg(long, default_value = ".")]
    case_dir: PathBuf,

    /// Output file; defaults to outputs/PPT/<customer>.<tag>.pptx under the
    /// case directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Explicit node binary path, skipping discovery.
    #[arg(long)]
    node_path: Option<PathBuf>,

    /// Directory holding the renderer scripts.
    #[arg(long, default_value = "scripts")]
    scripts_dir: PathBuf,

    /// Render timeout in seconds.
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Reload these sources from their backing files before assembling.
    #[arg(long = "force-reload")]
    force_reload: Vec<String>,

    /// Cap the slides emitted per section, for quick demo decks.
    #[arg(long)]
    page_limit: Option<usize>,

    /// Import data/Excel/<basename>.xlsx into data/JSON before anything else.
    #[arg(long = "import")]
    import: Vec<String>,

    /// Persist aliases learned during import back to the alias library.
    #[arg(long)]
    keep_aliases: bool,

    /// Assemble only; skip the render call.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let telemetry = init_telemetry(TelemetryConfig::default());

    let layout = FileLayout::rooted_at(&args.case_dir);
    let store = Arc::new(ValueStore::new(layout.clone()));

    let node_config = NodeConfig {
        node_path: args.node_path.clone(),
        scripts_dir: args.scripts_dir.clone(),
        timeout: Duration::from_secs(args.timeout),
    };

    if !args.import.is_empty() {
        let bridge = ExcelBridge::new(NodeRunner::new(node_config.clone()));
        let mut aliases = AliasResolver::new(Arc::clone(&store), args.keep_aliases);
        if let Some(metrics) = telemetry.metrics() {
            aliases = aliases.with_metrics(metrics);
        }
        let importer = ExcelImporter::new(Arc::clone(&store), bridge, Arc::new(aliases));
        for basename in &args.import {
            let rows = importer
                .import_workbook(basename, &ReadOptions::default())
                .await
                .with_context(|| format!("importing {basename}"))?;
            println!("{basename}: {rows} rows imported");
        }
    }

    let registry = Arc::new(SourceRegistry::new());
    if let Some(metrics) = telemetry.metrics() {
        registry.cache().set_metrics(metrics);
    }
    register_builtin_sources(&registry, Arc::clone(&store), None);
    register_document_source(&registry, Arc::clone(&store), ANALYSIS_SECTION);
    register_document_source(&registry, Arc::clone(&store), RANKING_SECTION);
    for name in &args.force_reload {
        registry
            .mark_force_reload(name)
            .with_context(|| format!("unknown source {name:?}"))?;
    }

    let mut assembler = ReportAssembler::new(Arc::clone(&registry));
    if let Some(metrics) = telemetry.metrics() {
        assembler = assembler.with_metrics(metrics);
    }

    // Year keys for the comparison chart and the default output name both
    // come from project settings.
    let settings = registry.resolve(sources::PROJECT_SETTINGS)?;
    let meta = sources::report_meta(&settings);

    let sections = report_sections(&meta, args.page_limit);
    if args.dry_run {
        let deck = assembler.assemble(&sections)?;
        println!(
            "{} slides for {} ({})",
            deck.slides.len(),
            deck.meta.customer_name,
            deck.meta.final_year
        );
        return Ok(());
    }

    // The renderer writes the file itself; make sure its directory exists.
    let output = args.output.unwrap_or_else(|| {
        layout.ppt_path(&DocLocation::new(meta.customer_name.as_str()), GENERATOR_TAG)
    });
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let renderer = NodeRenderer::new(node_config);

    let deck = assembler
        .assemble_and_render(&sections, &renderer, &output)
        .await?;
    println!(
        "{} slides written to {}",
        deck.slides.len(),
        output.display()
    );
    Ok(())
}

const ANALYSIS_SECTION: &str = "三级指标数据统计分析";
const RANKING_SECTION: &str = "三级指标数据前后各五名列表";

/// The standard deck: narrative analysis, top/bottom-five ranking, then a
/// year-over-year comparison chart from the internal database. The chart
/// plots the final year and the two before it, per the project settings.
fn report_sections(meta: &ReportMeta, page_limit: Option<usize>) -> Vec<Box<dyn Section>> {
    let text = TextSection::new(ANALYSIS_SECTION, ANALYSIS_SECTION);
    let text = match page_limit {
        Some(n) => text.with_page_limit(n),
        None => text,
    };

    let table = RankingTableSection::new(RANKING_SECTION, RANKING_SECTION);
    let table = match page_limit {
        Some(n) => table.with_page_limit(n),
        None => table,
    };

    let chart = ChartSection::new(
        "院内指标年度对比",
        sources::INTERNAL_DATABASE,
        deckgen_core::ChartKind::Bar,
        "药占比",
    )
    .with_series_keys(vec![meta.year_key(0), meta.year_key(1), meta.year_key(2)])
    .with_options(chart_options());
    let chart = match page_limit {
        Some(n) => chart.with_page_limit(n),
        None => chart,
    };

    vec![Box::new(text), Box::new(table), Box::new(chart)]
}

/// Theme colors and font sizes passed through to pptxgenjs unmodified.
fn chart_options() -> JsonMap {
    let mut options = JsonMap::new();
    let _ = options.insert(
        "chartColors".into(),
        serde_json::json!([
            scheme_color::ACCENT1,
            scheme_color::ACCENT2,
            scheme_color::ACCENT3
        ]),
    );
    let _ = options.insert("titleFontSize".into(), chart_font::TITLE.into());
    let _ = options.insert("legendFontSize".into(), chart_font::LEGEND.into());
    let _ = options.insert("dataLabelFontSize".into(), chart_font::DATA_LABEL.into());
    let _ = options.insert(
        "catAxisLabelFontSize".into(),
        chart_font::CAT_AXIS_LABEL.into(),
    );
    options
}

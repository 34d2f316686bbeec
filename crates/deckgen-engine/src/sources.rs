//! The builtin source catalog: project settings, the indicator direction
//! library, the hierarchy maps derived from the level-3 indicator settings,
//! and the two databases with their year/unit accessors.

use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use deckgen_core::{JsonMap, ReportMeta, ResolveError};
use deckgen_store::{reverted_value, DocLocation, ValueStore};

use crate::registry::SourceRegistry;

pub const PROJECT_SETTINGS: &str = "project_settings";
pub const INDICATOR_DIRECTION: &str = "indicator_direction";
pub const L3_TO_L2_MAP: &str = "l3_to_l2_map";
pub const L2_TO_L3_MAP: &str = "l2_to_l3_map";
pub const INTERNAL_DATABASE: &str = "internal_database";
pub const BENCHMARK_DATABASE: &str = "benchmark_database";

/// Backing-file basenames, matching the on-disk interop layout.
pub mod basename {
    pub const PROJECT_SETTINGS: &str = "项目设置";
    pub const INTERNAL_DATABASE: &str = "院内资料库";
    pub const BENCHMARK_DATABASE: &str = "对标资料库";
}

/// Keys inside the project-settings document.
pub mod key {
    pub const LEVEL3_SETTINGS: &str = "三级指标设置";
    pub const DIRECTION: &str = "指标导向";
    pub const PARENT: &str = "上级指标";
    pub const PROJECT_INFO: &str = "项目信息";
    pub const DATA_FIELD: &str = "数据资料";
}

/// Side-effect hook run once when the project-settings document first
/// resolves, handed the raw project-info block. External collaborators
/// (environment updates, case directories) plug in here.
pub type ProjectInfoHook = Arc<dyn Fn(&JsonMap) + Send + Sync>;

/// Register every builtin source on the registry. Producers are lazy; no
/// file is touched until a source is first resolved.
pub fn register_builtin_sources(
    registry: &SourceRegistry,
    store: Arc<ValueStore>,
    project_info_hook: Option<ProjectInfoHook>,
) {
    let settings_store = Arc::clone(&store);
    registry.register(PROJECT_SETTINGS, &[], move |_: &SourceRegistry| {
        let map = settings_store
            .load(&DocLocation::new(basename::PROJECT_SETTINGS))
            .map_err(|e| e.into_resolve(PROJECT_SETTINGS))?;
        if let Some(hook) = &project_info_hook {
            let info = map
                .get(key::PROJECT_INFO)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            hook(&info);
        }
        Ok(map)
    });

    registry.register(
        INDICATOR_DIRECTION,
        &[PROJECT_SETTINGS],
        |r: &SourceRegistry| {
            let settings = r.resolve(PROJECT_SETTINGS)?;
            Ok(scan_level3(&settings, key::DIRECTION))
        },
    );

    registry.register(L3_TO_L2_MAP, &[PROJECT_SETTINGS], |r: &SourceRegistry| {
        let settings = r.resolve(PROJECT_SETTINGS)?;
        Ok(scan_level3(&settings, key::PARENT))
    });

    // Always derived from the forward map, never built independently, so the
    // two stay exact inverses of the same settings snapshot.
    registry.register(L2_TO_L3_MAP, &[L3_TO_L2_MAP], |r: &SourceRegistry| {
        let forward = r.resolve(L3_TO_L2_MAP)?;
        let mut grouped = JsonMap::new();
        for (parent, children) in reverted_value(&forward) {
            let _ = grouped.insert(parent, Value::from(children));
        }
        Ok(grouped)
    });

    let internal_store = Arc::clone(&store);
    registry.register(INTERNAL_DATABASE, &[], move |_: &SourceRegistry| {
        internal_store
            .load(&DocLocation::new(basename::INTERNAL_DATABASE))
            .map_err(|e| e.into_resolve(INTERNAL_DATABASE))
    });

    let benchmark_store = store;
    registry.register(BENCHMARK_DATABASE, &[], move |_: &SourceRegistry| {
        benchmark_store
            .load(&DocLocation::new(basename::BENCHMARK_DATABASE))
            .map_err(|e| e.into_resolve(BENCHMARK_DATABASE))
    });

    debug!(sources = ?registry.names(), "builtin sources registered");
}

/// Register a plain document-backed source: resolved straight from
/// `data/JSON/<name>.json`, no derivation. Used for per-section content
/// documents (statistics analysis, ranking lists).
pub fn register_document_source(
    registry: &SourceRegistry,
    store: Arc<ValueStore>,
    name: impl Into<String>,
) {
    let name = name.into();
    let basename = name.clone();
    registry.register(name, &[], move |_: &SourceRegistry| {
        store
            .load(&DocLocation::new(&basename))
            .map_err(|e| e.into_resolve(&basename))
    });
}

/// Scan the level-3 indicator settings for one string-valued field,
/// producing indicator -> field value in document order. Entries without the
/// field are skipped.
fn scan_level3(settings: &JsonMap, field: &str) -> JsonMap {
    let mut result = JsonMap::new();
    let Some(level3) = settings.get(key::LEVEL3_SETTINGS).and_then(Value::as_object) else {
        return result;
    };
    for (indicator, spec) in level3 {
        if let Some(value) = spec.get(field).and_then(Value::as_str) {
            let _ = result.insert(indicator.clone(), Value::from(value));
        }
    }
    result
}

/// Year keys ("Y2021", ...) found across a database's entries, deduplicated
/// and sorted descending.
pub fn years(database: &JsonMap) -> Vec<String> {
    let year_key = Regex::new(r"^Y\d+$").expect("valid year pattern");
    let mut found: Vec<String> = Vec::new();
    for entry in database.values() {
        let Some(fields) = entry.as_object() else {
            continue;
        };
        for k in fields.keys() {
            if year_key.is_match(k) && !found.iter().any(|y| y == k) {
                found.push(k.clone());
            }
        }
    }
    found.sort_by(|a, b| b.cmp(a));
    found
}

/// Top-level keys of a database, in document order.
pub fn units(database: &JsonMap) -> Vec<String> {
    database.keys().cloned().collect()
}

/// Grouped view of the direction library: direction -> indicators, groups and
/// members both in first-seen order.
pub fn direction_groups(direction: &JsonMap) -> Vec<(String, Vec<String>)> {
    reverted_value(direction)
}

/// Snapshot of the derived indicator tree: forward and reverse hierarchy maps
/// plus the per-indicator direction tag, all resolved from the same settings
/// generation.
pub struct IndicatorHierarchy {
    forward: Arc<JsonMap>,
    reverse: Arc<JsonMap>,
    direction: Arc<JsonMap>,
}

impl IndicatorHierarchy {
    pub fn from_registry(registry: &SourceRegistry) -> Result<Self, ResolveError> {
        Ok(Self {
            forward: registry.resolve(L3_TO_L2_MAP)?,
            reverse: registry.resolve(L2_TO_L3_MAP)?,
            direction: registry.resolve(INDICATOR_DIRECTION)?,
        })
    }

    pub fn parent_of(&self, level3: &str) -> Option<&str> {
        self.forward.get(level3).and_then(Value::as_str)
    }

    pub fn children_of(&self, level2: &str) -> Vec<&str> {
        self.reverse
            .get(level2)
            .and_then(Value::as_array)
            .map(|children| children.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn direction_of(&self, level3: &str) -> Option<&str> {
        self.direction.get(level3).and_then(Value::as_str)
    }

    pub fn level3_names(&self) -> Vec<&str> {
        self.forward.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Read the report metadata out of the settings' project-info block. Each
/// field sits under a data-field wrapper; absent fields fall back to fixed
/// defaults.
pub fn report_meta(settings: &JsonMap) -> ReportMeta {
    let info = settings.get(key::PROJECT_INFO).and_then(Value::as_object);
    let field = |name: &str| -> Option<Value> {
        info.and_then(|i| i.get(name))
            .and_then(Value::as_object)
            .and_then(|wrapped| wrapped.get(key::DATA_FIELD))
            .cloned()
    };

    let defaults = ReportMeta::default();
    ReportMeta {
        project_name: field("projectName")
            .as_ref()
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or(defaults.project_name),
        customer_name: field("customerName")
            .as_ref()
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or(defaults.customer_name),
        final_year: field("finalYear")
            .as_ref()
            .and_then(Value::as_i64)
            .map(|y| y as i32)
            .unwrap_or(defaults.final_year),
        is_hospital: field("isHospital")
            .as_ref()
            .and_then(Value::as_bool)
            .unwrap_or(defaults.is_hospital),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckgen_store::FileLayout;
    use tempfile::TempDir;

    fn write_doc(dir: &TempDir, name: &str, content: &str) {
        let json_dir = dir.path().join("data").join("JSON");
        std::fs::create_dir_all(&json_dir).unwrap();
        std::fs::write(json_dir.join(format!("{name}.json")), content).unwrap();
    }

    fn registry_in(dir: &TempDir) -> SourceRegistry {
        let store = Arc::new(ValueStore::new(FileLayout::rooted_at(dir.path())));
        let registry = SourceRegistry::new();
        register_builtin_sources(&registry, store, None);
        registry
    }

    const SETTINGS: &str = r#"{
        "三级指标设置": {
            "药占比": {"指标导向": "低优", "上级指标": "费用控制"},
            "床位使用率": {"指标导向": "高优", "上级指标": "运营效率"},
            "平均住院日": {"指标导向": "低优", "上级指标": "运营效率"},
            "备注指标": {}
        },
        "项目信息": {
            "customerName": {"数据资料": "仁济医院"},
            "finalYear": {"数据资料": 2022},
            "isHospital": {"数据资料": true}
        }
    }"#;

    #[test]
    fn direction_library_scans_level3_settings() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir, basename::PROJECT_SETTINGS, SETTINGS);
        let registry = registry_in(&dir);

        let direction = registry.resolve(INDICATOR_DIRECTION).unwrap();
        assert_eq!(direction["药占比"], "低优");
        assert_eq!(direction["床位使用率"], "高优");
        assert!(direction.get("备注指标").is_none());

        let groups = direction_groups(&direction);
        assert_eq!(groups[0].0, "低优");
        assert_eq!(groups[0].1, ["药占比", "平均住院日"]);
        assert_eq!(groups[1].1, ["床位使用率"]);
    }

    #[test]
    fn hierarchy_maps_are_inverses() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir, basename::PROJECT_SETTINGS, SETTINGS);
        let registry = registry_in(&dir);

        let forward = registry.resolve(L3_TO_L2_MAP).unwrap();
        let reverse = registry.resolve(L2_TO_L3_MAP).unwrap();

        for (l3, l2) in forward.iter() {
            let l2 = l2.as_str().unwrap();
            let children = reverse[l2].as_array().unwrap();
            assert!(children.iter().any(|c| c == l3.as_str()), "{l3} not under {l2}");
        }
        for (l2, children) in reverse.iter() {
            for l3 in children.as_array().unwrap() {
                assert_eq!(forward[l3.as_str().unwrap()].as_str().unwrap(), l2);
            }
        }
    }

    #[test]
    fn hierarchy_snapshot_lookups() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir, basename::PROJECT_SETTINGS, SETTINGS);
        let registry = registry_in(&dir);

        let tree = IndicatorHierarchy::from_registry(&registry).unwrap();
        assert_eq!(tree.parent_of("药占比"), Some("费用控制"));
        assert_eq!(tree.children_of("运营效率"), ["床位使用率", "平均住院日"]);
        assert_eq!(tree.direction_of("床位使用率"), Some("高优"));
        assert_eq!(tree.level3_names().len(), 3);
    }

    #[test]
    fn missing_backing_files_degrade_to_empty_everywhere() {
        let dir = TempDir::new().unwrap();
        let registry = registry_in(&dir);

        registry.resolve_all().unwrap();
        let tree = IndicatorHierarchy::from_registry(&registry).unwrap();
        assert!(tree.is_empty());

        let db = registry.resolve(INTERNAL_DATABASE).unwrap();
        assert!(years(&db).is_empty());
        assert!(units(&db).is_empty());
        assert!(direction_groups(&registry.resolve(INDICATOR_DIRECTION).unwrap()).is_empty());
    }

    #[test]
    fn malformed_settings_surface_as_data_error() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir, basename::PROJECT_SETTINGS, "not json at all");
        let registry = registry_in(&dir);

        let err = registry.resolve(INDICATOR_DIRECTION).unwrap_err();
        assert!(err.is_data_error(), "got: {err}");
    }

    #[test]
    fn years_across_units_sorted_descending() {
        let dir = TempDir::new().unwrap();
        write_doc(
            &dir,
            basename::INTERNAL_DATABASE,
            r#"{
                "内科": {"Y2020": 1, "Y2021": 2, "名称": "x"},
                "外科": {"Y2019": 3, "Y2021": 4}
            }"#,
        );
        let registry = registry_in(&dir);

        let db = registry.resolve(INTERNAL_DATABASE).unwrap();
        assert_eq!(years(&db), ["Y2021", "Y2020", "Y2019"]);
        assert_eq!(units(&db), ["内科", "外科"]);
    }

    #[test]
    fn meta_reads_data_fields_with_fallbacks() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir, basename::PROJECT_SETTINGS, SETTINGS);
        let registry = registry_in(&dir);

        let settings = registry.resolve(PROJECT_SETTINGS).unwrap();
        let meta = report_meta(&settings);
        assert_eq!(meta.customer_name, "仁济医院");
        assert_eq!(meta.final_year, 2022);
        assert!(meta.is_hospital);

        let meta = report_meta(&JsonMap::new());
        assert_eq!(meta.customer_name, "Good Hospital");
        assert_eq!(meta.final_year, 2021);
        assert!(meta.is_hospital);
    }

    #[test]
    fn project_info_hook_fires_on_first_resolve_only() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let dir = TempDir::new().unwrap();
        write_doc(&dir, basename::PROJECT_SETTINGS, SETTINGS);
        let store = Arc::new(ValueStore::new(FileLayout::rooted_at(dir.path())));
        let registry = SourceRegistry::new();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(parking_lot::Mutex::new(JsonMap::new()));
        let c = Arc::clone(&calls);
        let s = Arc::clone(&seen);
        register_builtin_sources(
            &registry,
            store,
            Some(Arc::new(move |info: &JsonMap| {
                let _ = c.fetch_add(1, Ordering::SeqCst);
                *s.lock() = info.clone();
            })),
        );

        let _ = registry.resolve(PROJECT_SETTINGS).unwrap();
        let _ = registry.resolve(PROJECT_SETTINGS).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(seen.lock().contains_key("customerName"));
    }
}

use std::io::ErrorKind;

use serde_json::Value;
use tracing::debug;

use deckgen_core::JsonMap;

use crate::error::StoreError;
use crate::layout::{DocLocation, FileLayout};

/// File-backed JSON document loader. No caching here — memoization is the
/// source cache's job.
///
/// Miss policy: a missing file is "no data yet" and loads as an empty mapping.
/// A present-but-broken file is surfaced as `Malformed` so corruption never
/// masquerades as absence.
#[derive(Clone, Debug, Default)]
pub struct ValueStore {
    layout: FileLayout,
}

impl ValueStore {
    pub fn new(layout: FileLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &FileLayout {
        &self.layout
    }

    pub fn exists(&self, loc: &DocLocation) -> bool {
        self.layout.json_path(loc).exists()
    }

    pub fn load(&self, loc: &DocLocation) -> Result<JsonMap, StoreError> {
        let path = self.layout.json_path(loc);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "backing file absent, soft miss");
                return Ok(JsonMap::new());
            }
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", path.display()))),
        };

        let value: Value =
            serde_json::from_str(&raw).map_err(|e| StoreError::Malformed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        match value {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Malformed {
                path: path.display().to_string(),
                message: format!("expected top-level object, got {}", kind_of(&other)),
            }),
        }
    }

    /// Write pretty-printed JSON. Does not create directories — the caller
    /// owns the on-disk layout.
    pub fn store(&self, loc: &DocLocation, map: &JsonMap) -> Result<(), StoreError> {
        let path = self.layout.json_path(loc);
        let pretty = serde_json::to_string_pretty(map)?;
        std::fs::write(&path, pretty)
            .map_err(|e| StoreError::Io(format!("{}: {e}", path.display())))
    }

    /// Basenames of every JSON document in the default data folder.
    pub fn list_documents(&self) -> Vec<String> {
        let pattern = self
            .layout
            .data_dir
            .join("JSON")
            .join("*.json")
            .display()
            .to_string();
        let mut names: Vec<String> = glob::glob(&pattern)
            .map(|paths| {
                paths
                    .filter_map(Result::ok)
                    .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Project a document into rows: one object per top-level key, with the key
/// under `unitName`. `data_name` drills into one field per entry, `key` one
/// level deeper; `except` drops entries whose key matches the pattern.
pub fn db_as_array(
    map: &JsonMap,
    data_name: Option<&str>,
    key: Option<&str>,
    except: Option<&regex::Regex>,
) -> Vec<JsonMap> {
    let mut rows = Vec::new();
    for (unit, value) in map {
        if let Some(pattern) = except {
            if pattern.is_match(unit) {
                continue;
            }
        }

        let mut row = JsonMap::new();
        let _ = row.insert("unitName".into(), Value::String(unit.clone()));

        match (data_name, value.as_object()) {
            (Some(dn), Some(fields)) => {
                let projected = match (key, fields.get(dn)) {
                    (Some(k), Some(Value::Object(inner))) => inner.get(k).cloned(),
                    (None, found) => found.cloned(),
                    _ => None,
                };
                if let Some(v) = projected {
                    let _ = row.insert(dn.to_string(), v);
                }
            }
            (None, Some(fields)) => {
                for (k, v) in fields {
                    let _ = row.insert(k.clone(), v.clone());
                }
            }
            _ => {}
        }
        rows.push(row);
    }
    rows
}

/// Invert a string-valued mapping into value -> [keys], keys in first-seen
/// order. Non-string values are skipped.
pub fn reverted_value(map: &JsonMap) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for (k, v) in map {
        if let Value::String(s) = v {
            match groups.iter_mut().find(|(g, _)| g == s) {
                Some((_, keys)) => keys.push(k.clone()),
                None => groups.push((s.clone(), vec![k.clone()])),
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ValueStore {
        ValueStore::new(FileLayout::rooted_at(dir.path()))
    }

    fn write_doc(dir: &TempDir, basename: &str, content: &str) {
        let json_dir = dir.path().join("data").join("JSON");
        std::fs::create_dir_all(&json_dir).unwrap();
        std::fs::write(json_dir.join(format!("{basename}.json")), content).unwrap();
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let map = store.load(&DocLocation::new("nope")).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn malformed_json_is_an_error_not_a_miss() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir, "broken", "{not json");
        let store = store_in(&dir);
        let err = store.load(&DocLocation::new("broken")).unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }), "got: {err}");
    }

    #[test]
    fn non_object_top_level_is_malformed() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir, "list", "[1,2,3]");
        let store = store_in(&dir);
        let err = store.load(&DocLocation::new("list")).unwrap_err();
        assert!(err.to_string().contains("array"), "got: {err}");
    }

    #[test]
    fn load_preserves_key_order() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir, "ordered", r#"{"乙":1,"甲":2,"丙":3}"#);
        let store = store_in(&dir);
        let map = store.load(&DocLocation::new("ordered")).unwrap();
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, ["乙", "甲", "丙"]);
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("data").join("JSON")).unwrap();
        let store = store_in(&dir);
        let loc = DocLocation::new("saved");

        let mut map = JsonMap::new();
        let _ = map.insert("指标".into(), json!({"Y2021": 3.5}));
        store.store(&loc, &map).unwrap();

        let loaded = store.load(&loc).unwrap();
        assert_eq!(loaded, map);
    }

    #[test]
    fn store_does_not_create_directories() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let err = store
            .store(&DocLocation::new("orphan"), &JsonMap::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)), "got: {err}");
    }

    #[test]
    fn list_documents_sorted_basenames() {
        let dir = TempDir::new().unwrap();
        write_doc(&dir, "b", "{}");
        write_doc(&dir, "a", "{}");
        let store = store_in(&dir);
        assert_eq!(store.list_documents(), ["a", "b"]);
    }

    #[test]
    fn db_as_array_full_merge() {
        let map = serde_json::from_str::<JsonMap>(
            r#"{"内科": {"药占比": 32.1, "床位": 40}, "外科": {"药占比": 25.0}}"#,
        )
        .unwrap();
        let rows = db_as_array(&map, None, None, None);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["unitName"], "内科");
        assert_eq!(rows[0]["药占比"], 32.1);
        assert_eq!(rows[0]["床位"], 40);
    }

    #[test]
    fn db_as_array_projection_and_except() {
        let map = serde_json::from_str::<JsonMap>(
            r#"{"内科": {"药占比": {"Y2021": 32.1}}, "合计": {"药占比": {"Y2021": 99.0}}}"#,
        )
        .unwrap();
        let except = regex::Regex::new("合计").unwrap();
        let rows = db_as_array(&map, Some("药占比"), Some("Y2021"), Some(&except));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["unitName"], "内科");
        assert_eq!(rows[0]["药占比"], 32.1);
    }

    #[test]
    fn reverted_value_groups_in_first_seen_order() {
        let map = serde_json::from_str::<JsonMap>(
            r#"{"a": "高优", "b": "低优", "c": "高优", "d": 3}"#,
        )
        .unwrap();
        let groups = reverted_value(&map);
        assert_eq!(
            groups,
            vec![
                ("高优".to_string(), vec!["a".to_string(), "c".to_string()]),
                ("低优".to_string(), vec!["b".to_string()]),
            ]
        );
    }
}

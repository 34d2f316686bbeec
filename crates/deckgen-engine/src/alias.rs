use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use deckgen_core::{JsonMap, ResolveError};
use deckgen_store::{DocLocation, ValueStore};
use deckgen_telemetry::MetricsRecorder;

/// The shared alias library maintained across projects.
pub const ALIAS_LIBRARY: &str = "别名库";
/// The self-built library holding aliases learned from this project's input.
pub const SELF_BUILT_ALIAS_LIBRARY: &str = "自制别名库";

/// Characters stripped from raw names before the second lookup.
const NOISE_PATTERN: &str = r"[*↑↓()（、）/▲\s]";

/// Normalizes raw, noisily-formatted unit and indicator names against
/// per-namespace alias tables, learning new aliases as it goes.
///
/// Tables are loaded lazily through the value store (missing table = empty)
/// and mutated in memory; learned pairs reach disk only when `keep` is set.
pub struct AliasResolver {
    store: Arc<ValueStore>,
    noise: Regex,
    /// Persist learned aliases back to the backing file.
    keep: bool,
    tables: Mutex<HashMap<String, JsonMap>>,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl AliasResolver {
    pub fn new(store: Arc<ValueStore>, keep: bool) -> Self {
        Self {
            store,
            noise: Regex::new(NOISE_PATTERN).expect("valid noise pattern"),
            keep,
            tables: Mutex::new(HashMap::new()),
            metrics: None,
        }
    }

    /// Count learned aliases per namespace on the given recorder.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Map a raw name to its canonical form within `namespace`.
    ///
    /// Exact table hits win; otherwise noise characters are stripped and the
    /// cleaned form is looked up, learned, and returned. A raw name with no
    /// noise and no table entry passes through unchanged.
    pub fn normalize(&self, raw: &str, namespace: &str) -> Result<String, ResolveError> {
        let mut tables = self.tables.lock();
        let table = self.table_entry(&mut tables, namespace)?;

        if let Some(canonical) = table.get(raw).and_then(Value::as_str) {
            return Ok(canonical.to_string());
        }

        let cleaned = self.noise.replace_all(raw, "").into_owned();
        if cleaned == raw {
            // Nothing to clean, nothing to learn.
            return Ok(raw.to_string());
        }

        if let Some(canonical) = table.get(cleaned.as_str()).and_then(Value::as_str) {
            return Ok(canonical.to_string());
        }

        debug!(raw, canonical = %cleaned, namespace, "learned alias");
        if let Some(metrics) = &self.metrics {
            metrics.counter_inc("alias_learns", &[("namespace", namespace)], 1);
        }
        let _ = table.insert(raw.to_string(), Value::from(cleaned.clone()));
        if self.keep {
            let snapshot = table.clone();
            self.store
                .store(&DocLocation::new(namespace), &snapshot)
                .map_err(|e| e.into_resolve(namespace))?;
        }
        Ok(cleaned)
    }

    /// Strip noise characters without consulting any table.
    pub fn clean(&self, raw: &str) -> String {
        self.noise.replace_all(raw, "").into_owned()
    }

    /// Number of entries currently held for `namespace`.
    pub fn table_len(&self, namespace: &str) -> Result<usize, ResolveError> {
        let mut tables = self.tables.lock();
        Ok(self.table_entry(&mut tables, namespace)?.len())
    }

    /// Drop in-memory tables so the next lookup re-reads the backing files.
    pub fn reload(&self) {
        self.tables.lock().clear();
    }

    fn table_entry<'a>(
        &self,
        tables: &'a mut HashMap<String, JsonMap>,
        namespace: &str,
    ) -> Result<&'a mut JsonMap, ResolveError> {
        if !tables.contains_key(namespace) {
            let loaded = self
                .store
                .load(&DocLocation::new(namespace))
                .map_err(|e| e.into_resolve(namespace))?;
            let _ = tables.insert(namespace.to_string(), loaded);
        }
        Ok(tables.get_mut(namespace).expect("entry just inserted"))
    }
}

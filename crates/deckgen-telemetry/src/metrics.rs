use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Type of metric.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

/// A snapshot of a metric value at a point in time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub id: i64,
    pub timestamp: String,
    pub name: String,
    pub value: f64,
    pub labels: Option<String>,
    pub metric_type: MetricType,
}

/// Query parameters for searching historical snapshots.
#[derive(Clone, Debug, Default)]
pub struct MetricsQuery {
    pub name: Option<String>,
    pub since: Option<String>,
    pub limit: Option<u32>,
}

/// Summary statistics from a histogram.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub sum: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

enum Metric {
    /// Monotonically increasing.
    Counter(AtomicU64),
    /// Up or down; stored as f64 bits.
    Gauge(AtomicI64),
    /// All observations kept for percentile computation.
    Histogram(Mutex<Vec<f64>>),
}

impl Metric {
    fn current_value(&self) -> f64 {
        match self {
            Metric::Counter(v) => v.load(Ordering::Relaxed) as f64,
            Metric::Gauge(v) => f64::from_bits(v.load(Ordering::Relaxed) as u64),
            Metric::Histogram(obs) => summarize(&mut obs.lock()).p50,
        }
    }

    fn metric_type(&self) -> MetricType {
        match self {
            Metric::Counter(_) => MetricType::Counter,
            Metric::Gauge(_) => MetricType::Gauge,
            Metric::Histogram(_) => MetricType::Histogram,
        }
    }
}

fn summarize(obs: &mut Vec<f64>) -> HistogramSummary {
    if obs.is_empty() {
        return HistogramSummary::default();
    }
    obs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let count = obs.len();
    HistogramSummary {
        count: count as u64,
        sum: obs.iter().sum(),
        p50: obs[count / 2],
        p95: obs[((count as f64 * 0.95) as usize).min(count - 1)],
        p99: obs[((count as f64 * 0.99) as usize).min(count - 1)],
    }
}

/// Metric key: name + sorted labels.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct MetricKey {
    name: String,
    labels: Vec<(String, String)>,
}

impl MetricKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        let mut sorted: Vec<(String, String)> = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            name: name.to_string(),
            labels: sorted,
        }
    }

    fn labels_json(&self) -> Option<String> {
        if self.labels.is_empty() {
            return None;
        }
        let map: HashMap<&str, &str> = self
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        serde_json::to_string(&map).ok()
    }
}

/// Thread-safe metrics recorder backed by SQLite for historical snapshots.
/// Tracks cache hits/misses, producer runs, alias learns, render durations.
pub struct MetricsRecorder {
    metrics: RwLock<HashMap<MetricKey, Metric>>,
    db: Mutex<Connection>,
}

impl MetricsRecorder {
    pub fn new(db_path: &Path) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS metrics_snapshots (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 timestamp TEXT NOT NULL,
                 name TEXT NOT NULL,
                 value REAL NOT NULL,
                 labels TEXT,
                 metric_type TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_metrics_name ON metrics_snapshots(name, timestamp);",
        )?;
        Ok(Self {
            metrics: RwLock::new(HashMap::new()),
            db: Mutex::new(conn),
        })
    }

    fn with_metric<F: FnOnce(&Metric)>(&self, key: MetricKey, make: fn() -> Metric, f: F) {
        {
            let metrics = self.metrics.read();
            if let Some(m) = metrics.get(&key) {
                f(m);
                return;
            }
        }
        let mut metrics = self.metrics.write();
        let m = metrics.entry(key).or_insert_with(make);
        f(m);
    }

    pub fn counter_inc(&self, name: &str, labels: &[(&str, &str)], n: u64) {
        self.with_metric(
            MetricKey::new(name, labels),
            || Metric::Counter(AtomicU64::new(0)),
            |m| {
                if let Metric::Counter(v) = m {
                    let _ = v.fetch_add(n, Ordering::Relaxed);
                }
            },
        );
    }

    pub fn gauge_set(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.with_metric(
            MetricKey::new(name, labels),
            || Metric::Gauge(AtomicI64::new(0)),
            |m| {
                if let Metric::Gauge(v) = m {
                    v.store(value.to_bits() as i64, Ordering::Relaxed);
                }
            },
        );
    }

    pub fn histogram_observe(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.with_metric(
            MetricKey::new(name, labels),
            || Metric::Histogram(Mutex::new(Vec::new())),
            |m| {
                if let Metric::Histogram(obs) = m {
                    obs.lock().push(value);
                }
            },
        );
    }

    pub fn counter_get(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = MetricKey::new(name, labels);
        match self.metrics.read().get(&key) {
            Some(Metric::Counter(v)) => v.load(Ordering::Relaxed),
            _ => 0,
        }
    }

    pub fn gauge_get(&self, name: &str, labels: &[(&str, &str)]) -> f64 {
        let key = MetricKey::new(name, labels);
        match self.metrics.read().get(&key) {
            Some(Metric::Gauge(v)) => f64::from_bits(v.load(Ordering::Relaxed) as u64),
            _ => 0.0,
        }
    }

    pub fn histogram_summary(&self, name: &str, labels: &[(&str, &str)]) -> HistogramSummary {
        let key = MetricKey::new(name, labels);
        match self.metrics.read().get(&key) {
            Some(Metric::Histogram(obs)) => summarize(&mut obs.lock()),
            _ => HistogramSummary::default(),
        }
    }

    /// Persist the current value of every metric to SQLite.
    pub fn snapshot(&self) -> Result<usize, rusqlite::Error> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock();
        let metrics = self.metrics.read();
        let mut count = 0;
        for (key, metric) in metrics.iter() {
            let metric_type = match metric.metric_type() {
                MetricType::Counter => "counter",
                MetricType::Gauge => "gauge",
                MetricType::Histogram => "histogram",
            };
            let _ = db.execute(
                "INSERT INTO metrics_snapshots (timestamp, name, value, labels, metric_type)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![now, key.name, metric.current_value(), key.labels_json(), metric_type],
            )?;
            count += 1;
        }
        Ok(count)
    }

    /// Query historical metric snapshots.
    pub fn query(&self, q: &MetricsQuery) -> Result<Vec<MetricsSnapshot>, rusqlite::Error> {
        let db = self.db.lock();
        let mut sql = String::from(
            "SELECT id, timestamp, name, value, labels, metric_type FROM metrics_snapshots WHERE 1=1",
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(name) = &q.name {
            sql.push_str(&format!(" AND name = ?{}", params.len() + 1));
            params.push(Box::new(name.clone()));
        }
        if let Some(since) = &q.since {
            sql.push_str(&format!(" AND timestamp >= ?{}", params.len() + 1));
            params.push(Box::new(since.clone()));
        }

        sql.push_str(" ORDER BY id DESC");
        let limit = q.limit.unwrap_or(100);
        sql.push_str(&format!(" LIMIT {limit}"));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            let type_str: String = row.get(5)?;
            Ok(MetricsSnapshot {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                name: row.get(2)?,
                value: row.get(3)?,
                labels: row.get(4)?,
                metric_type: match type_str.as_str() {
                    "gauge" => MetricType::Gauge,
                    "histogram" => MetricType::Histogram,
                    _ => MetricType::Counter,
                },
            })
        })?;
        rows.collect()
    }
}

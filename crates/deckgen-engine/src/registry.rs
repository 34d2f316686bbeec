use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use deckgen_core::{JsonMap, ResolveError, SourceReader};

use crate::cache::SourceCache;

/// Produces the value of one named source, resolving any sources it needs
/// through the registry it is handed.
pub trait Producer: Send + Sync {
    fn produce(&self, registry: &SourceRegistry) -> Result<JsonMap, ResolveError>;
}

impl<F> Producer for F
where
    F: Fn(&SourceRegistry) -> Result<JsonMap, ResolveError> + Send + Sync,
{
    fn produce(&self, registry: &SourceRegistry) -> Result<JsonMap, ResolveError> {
        self(registry)
    }
}

struct SourceSpec {
    producer: Arc<dyn Producer>,
    depends_on: Vec<String>,
    /// When set, the next `resolve_all` drops this source (and everything
    /// downstream of it) before resolving.
    force_reload: AtomicBool,
    forced_in_gen: AtomicU64,
}

/// Named sources with lazy, cached, dependency-aware resolution.
///
/// Registration is cheap; nothing is read or computed until a source is
/// first resolved. Results are memoized in a [`SourceCache`] shared by all
/// clones of the registry handle.
pub struct SourceRegistry {
    specs: RwLock<HashMap<String, Arc<SourceSpec>>>,
    cache: SourceCache,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            specs: RwLock::new(HashMap::new()),
            cache: SourceCache::new(),
        }
    }

    /// Register a producer under `name`. Replaces any existing producer with
    /// the same name and drops its cached value.
    pub fn register<P>(&self, name: impl Into<String>, depends_on: &[&str], producer: P)
    where
        P: Producer + 'static,
    {
        let name = name.into();
        let spec = SourceSpec {
            producer: Arc::new(producer),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            force_reload: AtomicBool::new(false),
            forced_in_gen: AtomicU64::new(0),
        };
        debug!(source = %name, "registered source");
        let _ = self.cache.invalidate(&name);
        let _ = self.specs.write().insert(name, Arc::new(spec));
    }

    /// Resolve one source, producing it (and transitively whatever its
    /// producer asks for) on first access.
    pub fn resolve(&self, name: &str) -> Result<Arc<JsonMap>, ResolveError> {
        let spec = self
            .specs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::NoProducer(name.to_string()))?;
        self.cache
            .resolve_with(name, || spec.producer.produce(self))
    }

    /// Mark a source so the next [`resolve_all`](Self::resolve_all) reloads
    /// it from scratch.
    pub fn mark_force_reload(&self, name: &str) -> Result<(), ResolveError> {
        let specs = self.specs.read();
        let spec = specs
            .get(name)
            .ok_or_else(|| ResolveError::NoProducer(name.to_string()))?;
        spec.force_reload.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Resolve every registered source in dependency order.
    ///
    /// Sources marked for forced reload are invalidated first, along with
    /// every source that transitively depends on them; the marks are then
    /// consumed so a later pass does not reload again.
    pub fn resolve_all(&self) -> Result<(), ResolveError> {
        let gen = self.cache.generation();
        let order = self.topological_order()?;

        // Invalidate forced sources and their dependents before any
        // production so stale downstream values never survive.
        let forced: Vec<String> = {
            let specs = self.specs.read();
            order
                .iter()
                .filter(|name| {
                    let spec = &specs[*name];
                    spec.force_reload.swap(false, Ordering::SeqCst)
                        && spec.forced_in_gen.swap(gen, Ordering::SeqCst) != gen
                })
                .cloned()
                .collect()
        };
        if !forced.is_empty() {
            for name in self.with_dependents(&forced, &order) {
                if self.cache.invalidate(&name) {
                    info!(source = %name, "reloading");
                }
            }
        }

        for name in &order {
            let _ = self.resolve(name)?;
        }
        Ok(())
    }

    /// Drop every cached value. Producers stay registered.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Registered source names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.specs.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }

    fn topological_order(&self) -> Result<Vec<String>, ResolveError> {
        let specs = self.specs.read();
        let mut order = Vec::with_capacity(specs.len());
        let mut state: HashMap<&str, u8> = HashMap::new(); // 1 = visiting, 2 = done

        fn visit<'a>(
            name: &'a str,
            specs: &'a HashMap<String, Arc<SourceSpec>>,
            state: &mut HashMap<&'a str, u8>,
            order: &mut Vec<String>,
        ) -> Result<(), ResolveError> {
            match state.get(name) {
                Some(2) => return Ok(()),
                Some(_) => return Err(ResolveError::CircularDependency(name.to_string())),
                None => {}
            }
            let _ = state.insert(name, 1);
            if let Some(spec) = specs.get(name) {
                for dep in &spec.depends_on {
                    if specs.contains_key(dep.as_str()) {
                        visit(dep, specs, state, order)?;
                    }
                }
            }
            let _ = state.insert(name, 2);
            order.push(name.to_string());
            Ok(())
        }

        let mut names: Vec<&str> = specs.keys().map(String::as_str).collect();
        names.sort();
        for name in names {
            visit(name, &specs, &mut state, &mut order)?;
        }
        Ok(order)
    }

    /// The given sources plus everything that transitively depends on them,
    /// in registry order.
    fn with_dependents(&self, roots: &[String], order: &[String]) -> Vec<String> {
        let specs = self.specs.read();
        let mut affected: Vec<String> = roots.to_vec();
        // `order` is topological, so one forward pass catches transitive
        // dependents.
        for name in order {
            if affected.iter().any(|a| a == name) {
                continue;
            }
            if let Some(spec) = specs.get(name) {
                if spec.depends_on.iter().any(|d| affected.iter().any(|a| a == d)) {
                    affected.push(name.clone());
                }
            }
        }
        affected
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceReader for SourceRegistry {
    fn read(&self, name: &str) -> Result<Arc<JsonMap>, ResolveError> {
        self.resolve(name)
    }
}

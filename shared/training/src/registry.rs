use std::{collections::BTreeMap, fmt, path::Path, sync::Arc};

use crate::{
    backends::{MalletBackend, MfBackend, PprBackend, ScikitBackend, TestBackend},
    TrainingBackend,
};

pub const DEFAULT_POLICY: &str = "NaiveBestEffortPolicy";
pub const DEFAULT_INPUT_TYPE: &str = "doubles";
pub const DEFAULT_VERSION: &str = "1.0";

/// Identity a backend announces when nothing overrides it.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendDefaults {
    pub version: String,
    pub app_name: String,
    pub policy: String,
    pub input_type: String,
    pub params: BTreeMap<String, f64>,
}

impl BackendDefaults {
    fn new(name: &str, params: &[(&str, f64)]) -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            app_name: format!("{name}-app"),
            policy: DEFAULT_POLICY.to_string(),
            input_type: DEFAULT_INPUT_TYPE.to_string(),
            params: params
                .iter()
                .map(|(key, value)| (key.to_string(), *value))
                .collect(),
        }
    }
}

type Factory = fn(&Path) -> Arc<dyn TrainingBackend>;

pub struct BackendEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub defaults: BackendDefaults,
    factory: Factory,
}

impl BackendEntry {
    pub fn new(
        name: &'static str,
        description: &'static str,
        params: &[(&str, f64)],
        factory: Factory,
    ) -> Self {
        Self {
            name,
            description,
            defaults: BackendDefaults::new(name, params),
            factory,
        }
    }

    /// Builds the backend, rooting its on-disk state at `model_root/<name>`.
    pub fn create(&self, model_root: &Path) -> Arc<dyn TrainingBackend> {
        (self.factory)(&model_root.join(self.name))
    }
}

impl fmt::Debug for BackendEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendEntry")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Every training backend this binary can run, keyed by name.
///
/// There is no `xgboost` entry. Gradient boosting ran inside the training
/// process and has no command line tool to drive, so asking for it fails
/// like any other unknown name.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    entries: Vec<BackendEntry>,
}

impl BackendRegistry {
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register(BackendEntry::new(
            "test",
            "sleeps for a while and logs the batch",
            &[("alpha", 100.0), ("beta", 1500.0), ("weight", 10.0)],
            |_| Arc::new(TestBackend),
        ));
        registry.register(BackendEntry::new(
            "scikit",
            "logs retrain and fetch calls",
            &[],
            |_| Arc::new(ScikitBackend),
        ));
        registry.register(BackendEntry::new(
            "mf",
            "matrix factorization with FastMF",
            &[("alpha", 500.0), ("beta", 7500.0)],
            |root| Arc::new(MfBackend::new(root)),
        ));
        registry.register(BackendEntry::new(
            "ppr",
            "personalized PageRank",
            &[("alpha", 500.0), ("beta", 7500.0)],
            |root| Arc::new(PprBackend::new(root)),
        ));
        registry.register(BackendEntry::new(
            "mallet",
            "topic modeling with MALLET",
            &[("alpha", 24.0), ("beta", 12000.0)],
            |root| Arc::new(MalletBackend::new(root)),
        ));
        registry
    }

    /// Adds `entry`, replacing any entry with the same name.
    pub fn register(&mut self, entry: BackendEntry) {
        self.entries.retain(|existing| existing.name != entry.name);
        self.entries.push(entry);
    }

    /// Looks a backend up by name. The `_entries` suffix of module names is accepted.
    pub fn get(&self, name: &str) -> Option<&BackendEntry> {
        let name = name.strip_suffix("_entries").unwrap_or(name);
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BackendEntry> {
        self.entries.iter()
    }
}

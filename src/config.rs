use serde::Deserialize;

use crate::error::RebindError;
use crate::namer::{EntropySource, SeededEntropy, SyntheticNamer, SystemEntropy};
use crate::registry::TargetRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GlobalEntry {
    pub name: String,
    pub template: String,
}

/// Plugin options as given in the swc config, e.g.
///
/// ```json
/// ["node_globals_swc_plugin", { "exclude": ["setImmediate"], "traceIds": true }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginConfig {
    /// Start from the built-in `Buffer`/`process`/timers table.
    pub defaults: bool,
    /// Extra or replacement entries, applied after `defaults`.
    pub globals: Vec<GlobalEntry>,
    /// Names dropped from the table after `globals` is applied.
    pub exclude: Vec<String>,
    /// Fixed seed for reproducible synthetic names.
    pub seed: Option<u64>,
    pub max_name_attempts: Option<u32>,
    /// Also run the JSX `__uuid` tagger.
    pub trace_ids: bool,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            defaults: true,
            globals: vec![],
            exclude: vec![],
            seed: None,
            max_name_attempts: None,
            trace_ids: false,
        }
    }
}

impl PluginConfig {
    /// An absent or empty config means defaults; anything else must parse.
    pub fn from_json(raw: Option<&str>) -> Result<Self, RebindError> {
        match raw.map(str::trim) {
            None | Some("") | Some("null") => Ok(Self::default()),
            Some(raw) => serde_json::from_str(raw).map_err(|e| RebindError::Config {
                message: e.to_string(),
            }),
        }
    }

    pub fn registry(&self) -> Result<TargetRegistry, RebindError> {
        let mut registry = if self.defaults {
            TargetRegistry::node_globals()
        } else {
            TargetRegistry::empty()
        };
        for entry in &self.globals {
            registry.insert(entry.name.clone(), entry.template.clone())?;
        }
        for name in &self.exclude {
            registry.remove(name);
        }
        Ok(registry)
    }

    pub fn entropy(&self) -> Box<dyn EntropySource> {
        match self.seed {
            Some(seed) => Box::new(SeededEntropy::new(seed)),
            None => Box::new(SystemEntropy::new()),
        }
    }

    pub fn namer(&self) -> SyntheticNamer {
        let namer = SyntheticNamer::new(self.entropy());
        match self.max_name_attempts {
            Some(max) => namer.with_max_attempts(max),
            None => namer,
        }
    }
}

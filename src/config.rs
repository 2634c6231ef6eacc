use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::buchi::ConditionError;
use crate::checker::{Limits, LivenessAlgorithm, SearchMode, SearchOptions, Strategy};
use crate::model::Property;
use crate::net::Weight;
use crate::ptrie::DEFAULT_SPLIT_THRESHOLD;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CheckerConfig {
    #[serde(default)]
    pub strategy: Strategy,
    /// 未设置时由模型文件中的性质决定.
    #[serde(default)]
    pub mode: Option<SearchMode>,
    #[serde(default)]
    pub liveness: LivenessAlgorithm,
    #[serde(default)]
    pub max_states: Option<usize>,
    /// 秒.
    #[serde(default)]
    pub time_limit: Option<f64>,
    #[serde(default)]
    pub memory_limit_mb: Option<usize>,
    #[serde(default)]
    pub token_bound: Option<Weight>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_split_threshold")]
    pub split_threshold: usize,
    #[serde(default)]
    pub node_limit: Option<usize>,
    #[serde(default)]
    pub verify_encoding: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            mode: None,
            liveness: LivenessAlgorithm::default(),
            max_states: None,
            time_limit: None,
            memory_limit_mb: None,
            token_bound: None,
            seed: default_seed(),
            split_threshold: default_split_threshold(),
            node_limit: None,
            verify_encoding: false,
        }
    }
}

impl CheckerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: CheckerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(secs) = self.time_limit {
            Duration::try_from_secs_f64(secs).map_err(|err| {
                anyhow::anyhow!("time_limit must be a non-negative number of seconds, got {secs}: {err}")
            })?;
        }
        anyhow::ensure!(self.split_threshold > 0, "split_threshold must be positive");
        Ok(())
    }

    /// 未指定模式时采用性质的固有模式. 指定的模式与内置性质不符时报错,
    /// 只有直接给出的自动机可以改变模式.
    pub fn search_options(&self, property: &Property) -> Result<SearchOptions, ConditionError> {
        Ok(SearchOptions {
            mode: property.search_mode(self.mode)?,
            strategy: self.strategy,
            liveness: self.liveness,
            token_bound: self.token_bound,
            seed: self.seed,
            verify_encoding: self.verify_encoding,
            split_threshold: self.split_threshold,
            node_limit: self.node_limit,
        })
    }

    pub fn limits(&self) -> Limits {
        Limits::new()
            .with_max_states(self.max_states)
            .with_time_limit(
                self.time_limit
                    .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
            )
            .with_memory_limit_mb(self.memory_limit_mb)
    }
}

fn default_seed() -> u64 {
    0x5eed
}

fn default_split_threshold() -> usize {
    DEFAULT_SPLIT_THRESHOLD
}

use crate::error::{Error, Result};
use digitnet::optimizer::Optimizer;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimizerConfig {
    pub learning_rate: f64,
    pub rho: f64,
    pub epsilon: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            learning_rate: 0.001,
            rho: 0.95,
            epsilon: 1e-7,
        }
    }
}

impl OptimizerConfig {
    pub fn to_optimizer(&self) -> Optimizer {
        Optimizer::Adadelta {
            learning_rate: self.learning_rate,
            rho: self.rho,
            epsilon: self.epsilon,
        }
    }
}

/// Hyperparameters fixed for the lifetime of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub batch_size: usize,
    pub num_classes: usize,
    pub epochs: usize,
    pub seed: u64,
    pub optimizer: OptimizerConfig,
}

impl RunConfig {
    pub fn with_seed(seed: u64) -> Self {
        RunConfig {
            batch_size: 128,
            num_classes: 10,
            epochs: 3,
            seed,
            optimizer: OptimizerConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::Config(msg));
        if self.batch_size == 0 {
            return invalid("batch_size must be greater than 0".into());
        }
        if !(1..=10).contains(&self.num_classes) {
            return invalid(format!("num_classes must be in 1..=10, got {}", self.num_classes));
        }
        if self.epochs == 0 {
            return invalid("epochs must be at least 1".into());
        }
        let opt = &self.optimizer;
        if !(opt.learning_rate > 0.0) {
            return invalid(format!("optimizer.learning_rate must be positive, got {}", opt.learning_rate));
        }
        if !(0.0..1.0).contains(&opt.rho) {
            return invalid(format!("optimizer.rho must be in [0, 1), got {}", opt.rho));
        }
        if !(opt.epsilon > 0.0) {
            return invalid(format!("optimizer.epsilon must be positive, got {}", opt.epsilon));
        }
        Ok(())
    }
}

/// A seed in `0..2^31`, drawn when none is configured.
pub fn random_seed() -> u64 {
    rand::thread_rng().gen_range(0..1u64 << 31)
}

/// Layers configuration sources: defaults, then a JSON file, then `key=value` updates.
#[derive(Debug)]
pub struct ConfigBuilder {
    value: Value,
    updates: Value,
}

impl ConfigBuilder {
    pub fn new(seed: u64) -> Result<Self> {
        Ok(ConfigBuilder {
            value: serde_json::to_value(RunConfig::with_seed(seed))?,
            updates: Value::Object(Map::new()),
        })
    }

    /// Merges a JSON object file over the current values.
    pub fn with_file(mut self, path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let file: Value = serde_json::from_str(&text)?;
        let Value::Object(entries) = file else {
            return Err(Error::Config(format!("{} does not hold a JSON object", path.display())));
        };
        merge_object(&mut self.value, entries, "")?;
        Ok(self)
    }

    /// Applies a `dotted.key=value` update. Values are parsed as JSON, falling back to a plain
    /// string.
    pub fn update(&mut self, assignment: &str) -> Result<()> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("expected key=value, got `{assignment}`")))?;
        let key = key.trim();
        let value = serde_json::from_str(raw.trim()).unwrap_or_else(|_| Value::String(raw.trim().to_string()));
        set_existing(&mut self.value, key, value.clone())?;
        set_path(&mut self.updates, key, value);
        Ok(())
    }

    pub fn build(self) -> Result<(RunConfig, Value)> {
        let config: RunConfig = serde_json::from_value(self.value)?;
        config.validate()?;
        Ok((config, self.updates))
    }
}

fn merge_object(target: &mut Value, entries: Map<String, Value>, prefix: &str) -> Result<()> {
    for (key, value) in entries {
        let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        let slot = target
            .get_mut(&key)
            .ok_or_else(|| Error::UnknownConfigKey(path.clone()))?;
        match value {
            Value::Object(nested) if slot.is_object() => merge_object(slot, nested, &path)?,
            value => *slot = value,
        }
    }
    Ok(())
}

fn set_existing(target: &mut Value, key: &str, value: Value) -> Result<()> {
    let mut slot = target;
    for part in key.split('.') {
        slot = slot
            .get_mut(part)
            .ok_or_else(|| Error::UnknownConfigKey(key.to_string()))?;
    }
    *slot = value;
    Ok(())
}

fn set_path(target: &mut Value, key: &str, value: Value) {
    let mut slot = target;
    for part in key.split('.') {
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(map) = slot else { unreachable!() };
        slot = map.entry(part).or_insert(Value::Null);
    }
    *slot = value;
}

use clap::ValueEnum;
use continuum_wire::{serialize_params, BackendMetadata};
use serde::Serialize;
use std::{collections::BTreeMap, fmt, time::Duration};

/// Retrain policies the scheduler knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize)]
pub enum Policy {
    #[value(name = "NaiveBestEffortPolicy")]
    #[serde(rename = "NaiveBestEffortPolicy")]
    NaiveBestEffort,
    #[value(name = "SpeculativeBestEffortPolicy")]
    #[serde(rename = "SpeculativeBestEffortPolicy")]
    SpeculativeBestEffort,
    #[value(name = "CostAwarePolicy")]
    #[serde(rename = "CostAwarePolicy")]
    CostAware,
    #[value(name = "ManualPolicy")]
    #[serde(rename = "ManualPolicy")]
    Manual,
}

impl Policy {
    pub fn as_str(self) -> &'static str {
        match self {
            Policy::NaiveBestEffort => "NaiveBestEffortPolicy",
            Policy::SpeculativeBestEffort => "SpeculativeBestEffortPolicy",
            Policy::CostAware => "CostAwarePolicy",
            Policy::Manual => "ManualPolicy",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who this backend says it is. Fixed for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BackendIdentity {
    pub name: String,
    pub version: String,
    pub app_name: String,
    pub policy: Policy,
    pub input_type: String,
    pub params: BTreeMap<String, f64>,
}

impl BackendIdentity {
    pub fn metadata(&self) -> serde_json::Result<BackendMetadata> {
        Ok(BackendMetadata {
            name: self.name.clone(),
            version: self.version.clone(),
            app_name: self.app_name.clone(),
            policy: self.policy.to_string(),
            params: serialize_params(&self.params)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Longest single wait for inbound data before sending another heartbeat.
    pub poll_timeout: Duration,
    /// Silence after which a peer that has spoken before is considered gone.
    pub activity_timeout: Duration,
    pub reconnect_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(5000),
            activity_timeout: Duration::from_millis(30000),
            reconnect_delay: Duration::from_millis(1000),
        }
    }
}

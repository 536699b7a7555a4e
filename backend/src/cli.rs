use anyhow::{anyhow, Result};
use clap::{Args, ValueEnum};
use continuum_training::{BackendEntry, BackendRegistry};
use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf, time::Duration};
use tracing::Level;

use crate::{BackendIdentity, ConnectionConfig, LogOutput, Policy};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Training backend to drive. Run `show-backends` to list them.
    #[clap(long, default_value = "test", env)]
    pub backend_module: String,

    /// Host of the Continuum scheduler. Resolved once at startup.
    #[clap(long, default_value = "localhost", env)]
    pub continuum_host: String,

    #[clap(long, default_value_t = 7001, env)]
    pub continuum_port: u16,

    #[clap(long, default_value = "localhost", env)]
    pub redis_host: String,

    #[clap(long, default_value_t = 6379, env)]
    pub redis_port: u16,

    /// Redis database the data frontend stores retrain batches in.
    #[clap(long, default_value_t = continuum_data_store::REDIS_RETRAIN_DATA_DB, env)]
    pub redis_db: i64,

    /// How long one data store request may take before it counts as failed.
    #[clap(long, default_value_t = 5000, env)]
    pub redis_timeout_ms: u64,

    /// Name announced to the scheduler. Defaults to the backend's registry name.
    #[clap(long, env)]
    pub backend_name: Option<String>,

    #[clap(long, env)]
    pub backend_version: Option<String>,

    #[clap(long, env)]
    pub app_name: Option<String>,

    #[clap(long, value_enum, env)]
    pub policy_name: Option<Policy>,

    /// One of ints, doubles, floats, bytes, strings.
    #[clap(long, env)]
    pub input_type: Option<String>,

    #[clap(long, env)]
    pub alpha: Option<f64>,

    #[clap(long, env)]
    pub beta: Option<f64>,

    #[clap(long, env)]
    pub weight: Option<f64>,

    /// Directory holding each backend's tools and result directories.
    #[clap(long, default_value = "/var/opt", env)]
    pub model_root: PathBuf,

    #[clap(long, default_value_t = 5000, env)]
    pub poll_timeout_ms: u64,

    #[clap(long, default_value_t = 30000, env)]
    pub activity_timeout_ms: u64,

    #[clap(long, default_value_t = 1000, env)]
    pub reconnect_delay_ms: u64,

    /// How long a cancelled retrain gets to clean up before the next one starts.
    #[clap(long, default_value_t = 3, env)]
    pub cancel_grace_secs: u64,

    #[clap(long, value_enum, default_value_t = LogOutput::Console, env)]
    pub log_output: LogOutput,

    #[clap(long, default_value_t = Level::INFO, env)]
    pub log_level: Level,

    #[clap(long, env)]
    pub write_log: Option<PathBuf>,
}

impl RunArgs {
    /// Fills every identity field not given on the command line from the
    /// backend's registry defaults. Hyperparameters are merged key by key.
    pub fn identity(&self, entry: &BackendEntry) -> Result<BackendIdentity> {
        let defaults = &entry.defaults;
        let policy = match self.policy_name {
            Some(policy) => policy,
            None => Policy::from_str(&defaults.policy, false)
                .map_err(|err| anyhow!("backend {} has an invalid default policy: {err}", entry.name))?,
        };

        let mut params = defaults.params.clone();
        for (key, value) in [("alpha", self.alpha), ("beta", self.beta), ("weight", self.weight)] {
            if let Some(value) = value {
                params.insert(key.to_string(), value);
            }
        }

        Ok(BackendIdentity {
            name: self
                .backend_name
                .clone()
                .unwrap_or_else(|| entry.name.to_string()),
            version: self
                .backend_version
                .clone()
                .unwrap_or_else(|| defaults.version.clone()),
            app_name: self
                .app_name
                .clone()
                .unwrap_or_else(|| defaults.app_name.clone()),
            policy,
            input_type: self
                .input_type
                .clone()
                .unwrap_or_else(|| defaults.input_type.clone()),
            params,
        })
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            activity_timeout: Duration::from_millis(self.activity_timeout_ms),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }

    pub fn redis_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_timeout_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_secs(self.cancel_grace_secs)
    }
}

#[derive(Serialize)]
struct BackendListing<'a> {
    name: &'a str,
    description: &'a str,
    version: &'a str,
    app_name: &'a str,
    policy: &'a str,
    input_type: &'a str,
    params: &'a BTreeMap<String, f64>,
}

pub fn print_backends(registry: &BackendRegistry, json: bool) -> Result<()> {
    for entry in registry.iter() {
        let defaults = &entry.defaults;
        if json {
            let listing = BackendListing {
                name: entry.name,
                description: entry.description,
                version: &defaults.version,
                app_name: &defaults.app_name,
                policy: &defaults.policy,
                input_type: &defaults.input_type,
                params: &defaults.params,
            };
            println!("{}", serde_json::to_string(&listing)?);
        } else {
            println!("{}: {}", entry.name, entry.description);
            println!(
                "    version {}, app {}, policy {}, input {}, params {:?}",
                defaults.version, defaults.app_name, defaults.policy, defaults.input_type, defaults.params
            );
        }
    }
    Ok(())
}

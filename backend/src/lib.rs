mod cli;
mod config;
pub mod connection;
pub mod jobs;
mod logging;
mod state;

pub use cli::{print_backends, RunArgs};
pub use config::{BackendIdentity, ConnectionConfig, Policy};
pub use logging::{init_logging, LogOutput};
pub use state::ProcessState;

mod backend;
pub mod backends;
mod command;
mod model_dir;
mod registry;

pub use backend::TrainingBackend;
pub use command::{execute_command, CommandError};
pub use model_dir::{commit_dir, create_child_dir, latest_committed_dir, MARKER_FILE};
pub use registry::{
    BackendDefaults, BackendEntry, BackendRegistry, DEFAULT_INPUT_TYPE, DEFAULT_POLICY,
    DEFAULT_VERSION,
};

pub mod backup;
pub mod config;
pub mod database;
pub mod errors;
pub mod history;
pub mod logger;
pub mod orchestrator;
pub mod paths;
pub mod process;
pub mod restore;
pub mod system_checks;

pub use config::{ConfigOverrides, MirrorConfig};
pub use errors::{ErrorCategory, MirrorError, MirrorResult};
pub use logger::{FacadeLogger, MirrorLogger};
pub use orchestrator::{MirrorOrchestrator, MirrorSummary, RunOptions};
pub use process::{CommandRunner, SystemRunner};

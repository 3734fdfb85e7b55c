pub mod orchestrator;
pub mod storage;

pub use orchestrator::{LoadReport, LoadState, Registry};
pub use storage::{ComponentStore, RegistryStats};

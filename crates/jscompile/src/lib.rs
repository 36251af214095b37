pub mod aggregate;
pub mod combine;
pub mod config;
pub mod dirs;
pub mod emit;
pub mod error;
pub mod manifest;
pub mod minifier;
pub mod orchestrator;
pub mod request;

pub use config::Config;
pub use emit::{BuildOutput, EmitMode};
pub use error::{BuildError, BuildResult, Stage};
pub use orchestrator::BuildOrchestrator;
pub use request::BuildRequest;

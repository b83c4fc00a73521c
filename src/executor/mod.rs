pub mod orchestrator;
pub mod report;

pub use orchestrator::Orchestrator;

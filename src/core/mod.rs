// Public modules
pub mod console;
pub mod defaults;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod runner;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use pipeline::{LoadedPipeline, Overrides, Pipeline, PipelineSource, ResolvedPipeline, Step};
pub use runner::{
    ExecutionResult, ProcessExecutor, RunMode, RunOutcome, RunReport, StepExecutor, StepReport,
    StepStatus,
};

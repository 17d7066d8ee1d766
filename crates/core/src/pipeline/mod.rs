pub mod coordinator;
pub mod definition;

pub use coordinator::PipelineCoordinator;
pub use definition::{Pipeline, PipelineResult, Stage, StageFailure};

pub mod engine;
pub mod graph;
pub mod routing;
pub mod stages;
pub mod types;

pub use engine::WorkflowEngine;
pub use types::{AgentReply, FinalAction, Stage, StageUpdate, WorkflowState};

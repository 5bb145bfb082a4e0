pub mod agent_executor;
pub mod agents;
pub mod context;
pub mod prompt;
pub mod task;
pub mod workflow;

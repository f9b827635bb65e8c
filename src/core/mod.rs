//! 核心编排层：任务状态、检查点存储、任务图与控制平面门面

pub mod checkpoint;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod state;

pub use checkpoint::{
    create_checkpoint_store, CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore,
};
pub use error::{ErrorCode, OrchestratorError};
pub use graph::GraphEngine;
pub use orchestrator::Orchestrator;
pub use state::{AgentResponseRecord, ErrorInfo, HistoryEntry, TaskState, TaskStatus};

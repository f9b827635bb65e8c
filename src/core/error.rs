//! 控制平面错误类型与错误码
//!
//! 节点内部失败会写入 TaskState::error_info（携带 ErrorCode），不会作为 Err 冒泡；
//! 只有检查点存储失败才会从 advance 传播给调用方。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bridge::BridgeError;

/// 稳定错误码：写入 error_info 与日志，供外部调用方匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    AgentNotFound,
    AgentExecutionError,
    BridgeExecutionError,
    NoAssistantAvailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::AgentNotFound => "AGENT_NOT_FOUND",
            ErrorCode::AgentExecutionError => "AGENT_EXECUTION_ERROR",
            ErrorCode::BridgeExecutionError => "BRIDGE_EXECUTION_ERROR",
            ErrorCode::NoAssistantAvailable => "NO_ASSISTANT_AVAILABLE",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 控制平面对外错误（任务查询、校验、存储、桥接）
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// 检查点存储读写失败；advance 唯一向外传播的错误
    #[error("Checkpoint store error: {0}")]
    Checkpoint(#[from] anyhow::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::AgentNotFound).unwrap();
        assert_eq!(json, "\"AGENT_NOT_FOUND\"");
        let back: ErrorCode = serde_json::from_str("\"BRIDGE_EXECUTION_ERROR\"").unwrap();
        assert_eq!(back, ErrorCode::BridgeExecutionError);
    }

    #[test]
    fn error_code_display_matches_wire_form() {
        assert_eq!(ErrorCode::NoAssistantAvailable.to_string(), "NO_ASSISTANT_AVAILABLE");
    }
}

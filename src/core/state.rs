//! 托管任务状态：任务图节点读写、检查点存储持久化的可序列化快照
//!
//! history 只追加不修改；agent_responses 按 agent_id 后写覆盖先写；
//! target_agent_id / initial_parameters 一经写入不再变更（只在缺失时补填）。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::ErrorCode;

/// 任务整体状态
///
/// 单次 advance 内只向前推进（pending → in_progress → completed/error）；
/// 错误任务允许再次 advance，起始节点会重置为 in_progress，最终以本次运行结果为准。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 历史条目：step 为节点名，data 携带该步的输入或响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub step: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// 某个 agent 最近一次响应的记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponseRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_type: Option<String>,
    pub status: String,
    pub details: Value,
}

/// 节点失败详情：稳定错误码 + 人类可读消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

/// 一个被编排任务的完整快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    pub current_step: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub agent_responses: HashMap<String, AgentResponseRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_parameters: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_info: Option<ErrorInfo>,
}

impl TaskState {
    /// 原始 pending 状态：未执行任何节点、未写入任何存储
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            current_step: "initial".to_string(),
            status: TaskStatus::Pending,
            history: Vec::new(),
            agent_responses: HashMap::new(),
            target_agent_id: None,
            initial_parameters: None,
            error_info: None,
        }
    }

    /// 追加一条历史（唯一的历史写入口，保证只增不改）
    pub fn push_history(&mut self, step: &str, message: impl Into<String>, data: Option<Value>) {
        self.history.push(HistoryEntry {
            step: step.to_string(),
            message: message.into(),
            data,
        });
    }

    /// 记录节点失败：置 error 状态并写入 error_info
    pub fn record_error(&mut self, code: ErrorCode, message: impl Into<String>) {
        self.status = TaskStatus::Error;
        self.error_info = Some(ErrorInfo {
            code,
            message: message.into(),
        });
    }
}

//! 任务图引擎：五个固定节点按序推进任务状态
//!
//! 节点序列：start_task → process_request → dispatch_to_agent →
//! handle_agent_response → end_task。advance 一次跑完整个序列并在最后
//! 持久化一次；节点内部失败写入状态本身（status/error_info/history），
//! 只有检查点存储失败才向调用方传播。
//!
//! 已知并保留的缺口：同一任务并发 advance 为后写覆盖先写，不做乐观锁。

use std::sync::Arc;

use serde_json::{json, Value};

use crate::agents::{AgentRegistry, TaskDetails};
use crate::core::checkpoint::CheckpointStore;
use crate::core::error::{ErrorCode, OrchestratorError};
use crate::core::state::{AgentResponseRecord, TaskState, TaskStatus};

/// 节点名即 TaskState::current_step 的取值（end_task 例外：它把 step 置为 "completed"）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphNode {
    StartTask,
    ProcessRequest,
    DispatchToAgent,
    HandleAgentResponse,
    EndTask,
}

/// 固定的线性执行顺序
const NODE_SEQUENCE: [GraphNode; 5] = [
    GraphNode::StartTask,
    GraphNode::ProcessRequest,
    GraphNode::DispatchToAgent,
    GraphNode::HandleAgentResponse,
    GraphNode::EndTask,
];

/// 任务图引擎：持有检查点存储与 agent 注册表（依赖注入，无全局量）
pub struct GraphEngine {
    store: Arc<dyn CheckpointStore>,
    registry: Arc<AgentRegistry>,
}

impl GraphEngine {
    pub fn new(store: Arc<dyn CheckpointStore>, registry: Arc<AgentRegistry>) -> Self {
        Self { store, registry }
    }

    /// 返回任务的原始 pending 状态；不执行任何节点、不写存储
    pub fn initialize(&self, task_id: &str, initial_input: &Value) -> TaskState {
        tracing::debug!("Initializing task graph {} with input: {}", task_id, initial_input);
        TaskState::new(task_id)
    }

    /// 载入检查点（无则合成全新状态），按序执行全部节点，最后持久化并返回终态
    pub async fn advance(
        &self,
        task_id: &str,
        event_input: Value,
    ) -> Result<TaskState, OrchestratorError> {
        let mut state = match self.store.get(task_id).await? {
            Some(existing) => existing,
            None => {
                tracing::info!("No checkpoint found for task {}, starting fresh", task_id);
                TaskState::new(task_id)
            }
        };

        let mut input = event_input;
        for node in NODE_SEQUENCE {
            input = match node {
                GraphNode::StartTask => {
                    node_start_task(&mut state, &input);
                    input
                }
                GraphNode::ProcessRequest => {
                    node_process_request(&mut state, &input);
                    input
                }
                GraphNode::DispatchToAgent => self.node_dispatch_to_agent(&mut state, input).await,
                GraphNode::HandleAgentResponse => {
                    node_handle_agent_response(&mut state, &input);
                    input
                }
                GraphNode::EndTask => {
                    node_end_task(&mut state);
                    input
                }
            };
        }

        self.store.put(task_id, &state).await?;
        tracing::info!(
            "Task {} advanced to step '{}' with status '{}'",
            task_id,
            state.current_step,
            state.status
        );
        Ok(state)
    }

    /// 纯存储读取；无检查点时 Ok(None)
    pub async fn get_state(&self, task_id: &str) -> Result<Option<TaskState>, OrchestratorError> {
        Ok(self.store.get(task_id).await?)
    }

    /// dispatch_to_agent 节点：查注册表并调用 agent；失败捕获进状态，任务图继续
    async fn node_dispatch_to_agent(&self, state: &mut TaskState, input: Value) -> Value {
        let target = state
            .target_agent_id
            .clone()
            .unwrap_or_else(|| "unknown_agent".to_string());

        state.current_step = "dispatch_to_agent".to_string();
        state.push_history(
            "dispatch_to_agent",
            format!("Attempting to dispatch task to agent: {}", target),
            Some(json!({
                "agent_id": target,
                "action_type": input.get("action_type").cloned().unwrap_or(Value::Null),
            })),
        );

        let Some(agent) = self.registry.get(&target).await else {
            let message = format!("Agent {} not found in registered agents.", target);
            tracing::warn!("Task {}: {}", state.task_id, message);
            return capture_dispatch_failure(state, &target, ErrorCode::AgentNotFound, message);
        };

        let details = TaskDetails {
            task_id: state.task_id.clone(),
            parameters: state.initial_parameters.clone().unwrap_or_else(|| json!({})),
            current_event: input.clone(),
        };

        match agent.process(details).await {
            Ok(reply) => {
                let mut handoff = serde_json::to_value(&reply).unwrap_or_else(|_| json!({}));
                if let Some(obj) = handoff.as_object_mut() {
                    obj.entry("source_agent_id")
                        .or_insert_with(|| Value::String(target.clone()));
                    obj.entry("event_type")
                        .or_insert_with(|| Value::String("agent_response".to_string()));
                }
                state.agent_responses.insert(
                    target.clone(),
                    AgentResponseRecord {
                        last_event_type: None,
                        status: "completed".to_string(),
                        details: handoff.clone(),
                    },
                );
                tracing::info!("Task {}: received response from {}", state.task_id, target);
                handoff
            }
            Err(e) => {
                let message = format!("Error processing task by agent {}: {}", target, e);
                tracing::warn!("Task {}: {}", state.task_id, message);
                capture_dispatch_failure(state, &target, ErrorCode::AgentExecutionError, message)
            }
        }
    }
}

/// start_task 节点：补填创建输入、重置为 in_progress（错误任务重新推进也走这里）
fn node_start_task(state: &mut TaskState, input: &Value) {
    if state.target_agent_id.is_none() {
        if let Some(target) = input.get("target_agent_id").and_then(Value::as_str) {
            state.target_agent_id = Some(target.to_string());
        }
    }
    if state.initial_parameters.is_none() {
        if let Some(params) = input.get("parameters") {
            if !params.is_null() {
                state.initial_parameters = Some(params.clone());
            }
        }
    }

    state.current_step = "start_task".to_string();
    state.status = TaskStatus::InProgress;
    // 重新推进时以本轮结果为准，上一轮的错误详情随之清除
    state.error_info = None;
    state.push_history("start_task", "Task initiated.", None);
}

/// process_request 节点：记录本次输入；任何输入形状都不失败
fn node_process_request(state: &mut TaskState, input: &Value) {
    state.current_step = "process_request".to_string();
    state.push_history(
        "process_request",
        format!("Processing request. Input: {}", input),
        Some(input.clone()),
    );

    let action_type = input.get("action_type").and_then(Value::as_str);
    let target = input.get("target_agent_id").and_then(Value::as_str);
    if let (Some(action), Some(target)) = (action_type, target) {
        state.push_history(
            "initial_action_request",
            format!("Initial action '{}' requested for agent '{}'.", action, target),
            None,
        );
    }
}

/// handle_agent_response 节点：按响应状态映射任务状态，记录到 agent_responses
fn node_handle_agent_response(state: &mut TaskState, input: &Value) {
    let source = input
        .get("source_agent_id")
        .and_then(Value::as_str)
        .unwrap_or("unknown_agent")
        .to_string();
    let event_type = input
        .get("event_type")
        .and_then(Value::as_str)
        .unwrap_or("unknown_event")
        .to_string();

    state.current_step = "handle_agent_response".to_string();
    state.push_history(
        "handle_agent_response",
        format!("Received response from agent: {}, Event: {}", source, event_type),
        Some(input.clone()),
    );

    let status = input
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("processed")
        .to_string();
    state.agent_responses.insert(
        source,
        AgentResponseRecord {
            last_event_type: Some(event_type),
            status: status.clone(),
            details: input.clone(),
        },
    );

    match status.as_str() {
        "completed_successfully" => state.status = TaskStatus::Completed,
        "failed" => state.status = TaskStatus::Error,
        "in_progress" => state.status = TaskStatus::InProgress,
        _ => {}
    }
}

/// end_task 节点：step 固定置为 "completed"，状态除 error 外一律收敛为 completed
fn node_end_task(state: &mut TaskState) {
    state.current_step = "completed".to_string();
    if state.status != TaskStatus::Error {
        state.status = TaskStatus::Completed;
    }
    state.push_history("end_task", "Task processing finished.", None);
}

/// 派发失败的统一捕获：置错、记历史、写入失败响应，返回交给下一节点的错误输入
fn capture_dispatch_failure(
    state: &mut TaskState,
    target: &str,
    code: ErrorCode,
    message: String,
) -> Value {
    state.record_error(code, message.clone());
    state.push_history("dispatch_to_agent_error", message.clone(), None);
    state.agent_responses.insert(
        target.to_string(),
        AgentResponseRecord {
            last_event_type: None,
            status: "failed".to_string(),
            details: json!({ "error": message }),
        },
    );
    json!({ "error": message, "source_agent_id": target })
}

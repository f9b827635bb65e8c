//! Waggle - Rust 游戏开发智能体控制平面
//!
//! 模块划分：
//! - **agents**: Agent trait、注册表与内置游戏开发 agent
//! - **bridge**: 工具链桥接（FIFO 队列 + 惰性单 worker + 结果缓存）
//! - **collab**: 多智能体协作协议与事件总线
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 任务状态、检查点存储、任务图与控制平面门面
//! - **observability**: tracing 日志初始化
//! - **prompts**: 提示词注册表（模板 + 必填变量）

pub mod agents;
pub mod bridge;
pub mod collab;
pub mod config;
pub mod core;
pub mod observability;
pub mod prompts;

pub use crate::core::{Orchestrator, TaskState, TaskStatus};

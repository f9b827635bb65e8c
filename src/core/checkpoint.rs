//! 检查点存储：任务状态的读写抽象与两种实现
//!
//! get 返回 Ok(None) 表示该任务尚无检查点（全新开始），不是错误；
//! put 成功后随即 get 必能读到该状态（读己之写）。默认内存实现，
//! 配置了 db_path 时用 SQLite（状态 JSON 序列化后落库）。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{Mutex, RwLock};

use crate::core::state::TaskState;

/// 检查点存储接口
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 读取任务检查点；不存在时返回 Ok(None)
    async fn get(&self, task_id: &str) -> anyhow::Result<Option<TaskState>>;

    /// 写入（覆盖）任务检查点
    async fn put(&self, task_id: &str, state: &TaskState) -> anyhow::Result<()>;
}

/// 内存检查点存储
#[derive(Default)]
pub struct MemoryCheckpointStore {
    states: RwLock<HashMap<String, TaskState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, task_id: &str) -> anyhow::Result<Option<TaskState>> {
        Ok(self.states.read().await.get(task_id).cloned())
    }

    async fn put(&self, task_id: &str, state: &TaskState) -> anyhow::Result<()> {
        self.states
            .write()
            .await
            .insert(task_id.to_string(), state.clone());
        Ok(())
    }
}

/// SQLite 检查点存储：单表 upsert，父目录不存在时自动创建
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    pub fn new(db_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS checkpoints (
                task_id    TEXT PRIMARY KEY,
                state      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn get(&self, task_id: &str) -> anyhow::Result<Option<TaskState>> {
        let conn = self.conn.lock().await;
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM checkpoints WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, task_id: &str, state: &TaskState) -> anyhow::Result<()> {
        let json = serde_json::to_string(state)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO checkpoints (task_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(task_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![task_id, json, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

/// 创建检查点存储
///
/// 配置了 db_path 且能打开时用 SQLite；打开失败记日志并回退内存存储。
pub fn create_checkpoint_store(db_path: Option<&Path>) -> Arc<dyn CheckpointStore> {
    if let Some(path) = db_path {
        match SqliteCheckpointStore::new(path) {
            Ok(store) => {
                tracing::info!("Using sqlite checkpoint store: {:?}", path);
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to open sqlite checkpoint store, falling back to memory: {}",
                    e
                );
            }
        }
    }
    tracing::info!("Using in-memory checkpoint store");
    Arc::new(MemoryCheckpointStore::new())
}

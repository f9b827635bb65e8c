//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WAGGLE__*` 覆盖
//! （双下划线表示嵌套，如 `WAGGLE__CHECKPOINT__DB_PATH=data/tasks.db`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub checkpoint: CheckpointSection,
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub events: EventsSection,
    #[serde(default)]
    pub prompts: PromptsSection,
}

/// [app] 段：应用名
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [checkpoint] 段：SQLite 检查点路径，未设置时用内存存储
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CheckpointSection {
    pub db_path: Option<PathBuf>,
}

/// [bridge] 段：结果缓存开关与调用方侧的提交超时
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSection {
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,
    /// submit 外层 tokio::time::timeout 的秒数；桥接本身不计时
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            cache_enabled: default_cache_enabled(),
            submit_timeout_secs: default_submit_timeout_secs(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_submit_timeout_secs() -> u64 {
    30
}

/// [events] 段：事件总线历史环形缓冲容量
#[derive(Debug, Clone, Deserialize)]
pub struct EventsSection {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

fn default_history_limit() -> usize {
    100
}

/// [prompts] 段：提示词清单目录（*.toml），未设置则只用内置提示词
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PromptsSection {
    pub dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            checkpoint: CheckpointSection::default(),
            bridge: BridgeSection::default(),
            events: EventsSection::default(),
            prompts: PromptsSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 WAGGLE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WAGGLE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(
                config::File::with_name(name).required(false),
            );
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WAGGLE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置（调用方决定是否用新配置重建存储等组件）
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}

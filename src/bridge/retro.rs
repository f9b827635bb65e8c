//! Retro 像素资产生成处理器（确定性 mock）
//!
//! 对接像素扩散工具链的桥接处理器：校验生成参数、给出稳定的 mock
//! 资产记录，并提供规范化缓存键，让等价请求只执行一次。

use async_trait::async_trait;
use serde_json::{json, Value};

use super::params::{generation_cache_key, validate_generation_parameters};
use super::{BridgeHandler, BridgeRequest};

pub const GENERATE_IMAGE_ASSET: &str = "GENERATE_IMAGE_ASSET";
pub const GENERATE_TEXTURE_ASSET: &str = "GENERATE_TEXTURE_ASSET";
pub const GENERATE_SPRITE_SHEET: &str = "GENERATE_SPRITE_SHEET";

const SUPPORTED: &[&str] = &[
    GENERATE_IMAGE_ASSET,
    GENERATE_TEXTURE_ASSET,
    GENERATE_SPRITE_SHEET,
];

const DEFAULT_PROMPT: &str = "a generic 2D asset";

fn stable_hash(text: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

fn prompt_of(payload: &Value) -> String {
    payload
        .get("prompt")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROMPT)
        .to_string()
}

fn parameters_of(payload: &Value) -> Value {
    payload.get("parameters").cloned().unwrap_or(json!({}))
}

/// 像素资产生成工具链
#[derive(Default)]
pub struct RetroForgeHandler;

impl RetroForgeHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BridgeHandler for RetroForgeHandler {
    fn name(&self) -> &str {
        "retro_forge"
    }

    fn supported_types(&self) -> &[&str] {
        SUPPORTED
    }

    async fn handle(&self, request: &BridgeRequest) -> Result<Value, String> {
        let prompt = prompt_of(&request.payload);
        let validated = validate_generation_parameters(&parameters_of(&request.payload));
        tracing::info!(
            "retro_forge: handling '{}' for prompt '{}'",
            request.request_type,
            prompt
        );

        let extension = if request.request_type == GENERATE_SPRITE_SHEET {
            "_spritesheet.png"
        } else {
            ".png"
        };
        let output_path = format!(
            "generated_assets/retro_forge/{}_{:08x}{}",
            request.request_type.to_lowercase(),
            stable_hash(&prompt) as u32,
            extension
        );

        let record = match request.request_type.as_str() {
            GENERATE_IMAGE_ASSET => json!({
                "request_id": request.id,
                "status": "success_mock",
                "asset_type": "image",
                "prompt": prompt,
                "image_path": output_path,
                "resolution": validated["resolution"],
                "format": "png",
                "parameters_used": validated,
            }),
            GENERATE_TEXTURE_ASSET => json!({
                "request_id": request.id,
                "status": "success_mock",
                "asset_type": "texture",
                "prompt": prompt,
                "texture_path": output_path,
                "resolution": validated["resolution"],
                "tileable": validated["tileable"],
                "parameters_used": validated,
            }),
            GENERATE_SPRITE_SHEET => json!({
                "request_id": request.id,
                "status": "success_mock",
                "asset_type": "sprite_sheet",
                "prompt": prompt,
                "sheet_path": output_path,
                "num_frames": validated["animation_frames"],
                "parameters_used": validated,
            }),
            other => {
                return Err(format!(
                    "Unsupported request type for RetroForgeHandler: {}",
                    other
                ))
            }
        };
        Ok(record)
    }

    fn cache_key(&self, _request_type: &str, payload: &Value) -> Option<String> {
        let prompt = prompt_of(payload);
        let validated = validate_generation_parameters(&parameters_of(payload));
        Some(generation_cache_key(&prompt, &validated))
    }
}

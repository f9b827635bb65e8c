//! 生成参数校验与规范化缓存键
//!
//! 像素生成工具链只认四个参数；其余键一律丢弃，非法值回落到默认值。
//! 缓存键由 prompt 与"键递归排序后"的参数 JSON 拼成，调用方无论以
//! 什么插入顺序传参都会命中同一条缓存。

use serde_json::{json, Map, Value};

/// 分辨率默认值，宽高都要求是 2 的幂
pub const DEFAULT_RESOLUTION: [i64; 2] = [64, 64];

fn is_power_of_two(n: i64) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

/// 校验并规范化生成参数
///
/// 输出固定包含 `resolution`、`palette_lock`、`tileable`、
/// `animation_frames` 四个键；输入里不认识的键不会出现在输出中。
pub fn validate_generation_parameters(params: &Value) -> Value {
    let source = params.as_object().cloned().unwrap_or_default();
    let mut validated = Map::new();

    let resolution = source
        .get("resolution")
        .and_then(Value::as_array)
        .and_then(|items| {
            if items.len() != 2 {
                return None;
            }
            let w = items[0].as_i64()?;
            let h = items[1].as_i64()?;
            (is_power_of_two(w) && is_power_of_two(h)).then(|| json!([w, h]))
        });
    let resolution = match resolution {
        Some(value) => value,
        None => {
            if source.contains_key("resolution") {
                tracing::warn!(
                    "invalid resolution {:?}, falling back to {:?}",
                    source.get("resolution"),
                    DEFAULT_RESOLUTION
                );
            }
            json!(DEFAULT_RESOLUTION)
        }
    };
    validated.insert("resolution".to_string(), resolution);

    let palette_lock = source
        .get("palette_lock")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    validated.insert("palette_lock".to_string(), Value::Bool(palette_lock));

    let tileable = source
        .get("tileable")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    validated.insert("tileable".to_string(), Value::Bool(tileable));

    let animation_frames = source
        .get("animation_frames")
        .and_then(Value::as_i64)
        .filter(|n| *n > 0)
        .unwrap_or(1);
    validated.insert("animation_frames".to_string(), json!(animation_frames));

    Value::Object(validated)
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (key, nested) in entries {
                out.insert(key.clone(), canonicalize(nested));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// 键递归排序后的紧凑 JSON 序列化
pub fn canonical_json(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// `"{prompt}:{canonical_json(params)}"` 形式的缓存键
pub fn generation_cache_key(prompt: &str, params: &Value) -> String {
    format!("{}:{}", prompt, canonical_json(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_parameters_pass_through() {
        let validated = validate_generation_parameters(&json!({
            "resolution": [32, 128],
            "palette_lock": false,
            "tileable": true,
            "animation_frames": 8,
        }));
        assert_eq!(validated["resolution"], json!([32, 128]));
        assert_eq!(validated["palette_lock"], json!(false));
        assert_eq!(validated["tileable"], json!(true));
        assert_eq!(validated["animation_frames"], json!(8));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let validated = validate_generation_parameters(&json!({
            "resolution": [30, 30],
            "palette_lock": "yes",
            "animation_frames": 0,
        }));
        assert_eq!(validated["resolution"], json!([64, 64]));
        assert_eq!(validated["palette_lock"], json!(true));
        assert_eq!(validated["tileable"], json!(false));
        assert_eq!(validated["animation_frames"], json!(1));
    }

    #[test]
    fn missing_parameters_get_full_defaults() {
        let validated = validate_generation_parameters(&json!({}));
        assert_eq!(validated["resolution"], json!([64, 64]));
        assert_eq!(validated["palette_lock"], json!(true));
        assert_eq!(validated["tileable"], json!(false));
        assert_eq!(validated["animation_frames"], json!(1));
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let validated = validate_generation_parameters(&json!({
            "resolution": [16, 16],
            "seed": 42,
        }));
        assert!(validated.get("seed").is_none());
    }

    #[test]
    fn non_object_parameters_behave_like_empty() {
        let validated = validate_generation_parameters(&json!("not an object"));
        assert_eq!(validated["resolution"], json!([64, 64]));
    }

    #[test]
    fn cache_key_is_insensitive_to_key_order() {
        let a = json!({ "tileable": true, "resolution": [32, 32], "nested": { "b": 1, "a": 2 } });
        let b = json!({ "nested": { "a": 2, "b": 1 }, "resolution": [32, 32], "tileable": true });
        assert_eq!(
            generation_cache_key("a crate", &a),
            generation_cache_key("a crate", &b)
        );
    }

    #[test]
    fn cache_key_distinguishes_different_parameters() {
        let a = json!({ "resolution": [32, 32] });
        let b = json!({ "resolution": [64, 64] });
        assert_ne!(
            generation_cache_key("a crate", &a),
            generation_cache_key("a crate", &b)
        );
    }
}

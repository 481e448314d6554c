use serde_json::Value;

/// Sanitizes sensitive fields in JSON payloads for logging
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(key, val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "phone" | "client_phone" | "code" | "password" | "secret" | "token" | "authorization"
    )
}

fn is_phone_field(key: &str) -> bool {
    matches!(key.to_lowercase().as_str(), "phone" | "client_phone")
}

/// Phone numbers keep a short tail for correlation; every other secret is hidden entirely.
fn mask_value(key: &str, value: &Value) -> Value {
    match value {
        Value::String(s) if is_phone_field(key) => Value::String(mask_phone(s)),
        _ => Value::String("****".to_string()),
    }
}

/// Keeps the last two characters of long values, nothing of short ones.
pub fn mask_phone(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 6 {
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("****{}", tail)
    } else {
        "****".to_string()
    }
}

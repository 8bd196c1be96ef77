use serde::Serialize;

/// JSON mode wraps everything in `{"success": ..., "data": ...}` for
/// scripting; human mode prints whatever the handler formatted.
pub fn success<T: Serialize>(json: bool, data: &T, human: impl FnOnce()) {
    if json {
        let body = serde_json::json!({ "success": true, "data": data });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        human();
    }
}

pub fn warn(json: bool, message: &str) {
    if !json {
        eprintln!("warning: {message}");
    }
}

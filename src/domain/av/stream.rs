use serde_json::Value;

pub trait FromStream {
    fn from_stream(stream_data: &Value) -> Option<Box<Self>>
    where
        Self: Sized;
}

/// ffprobe prints most numbers as JSON strings (`"bit_rate": "128000"`); accept both forms.
pub(crate) fn number_field(stream_data: &Value, key: &str) -> Option<u64> {
    match stream_data.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

pub(crate) fn float_field(stream_data: &Value, key: &str) -> Option<f64> {
    match stream_data.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub(crate) fn string_field(stream_data: &Value, key: &str) -> Option<String> {
    stream_data
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "unknown")
        .map(String::from)
}

pub(crate) fn is_codec_type(stream_data: &Value, codec_type: &str) -> bool {
    stream_data.get("codec_type").and_then(|v| v.as_str()) == Some(codec_type)
}

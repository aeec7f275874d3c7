//! Mapping of provider task payloads onto [`GenerationStatus`].

use serde_json::Value;
use vidgen_core::generation::GenerationStatus;

/// Map a provider task status string onto our lifecycle.
///
/// `SUCCEEDED` maps to `processing`; unknown values map to `queued`.
pub fn map_task_status(raw: &str) -> GenerationStatus {
    match raw {
        "SUCCEEDED" => GenerationStatus::Processing,
        "FAILED" | "CANCELLED" | "THROTTLED" => GenerationStatus::Failed,
        "RUNNING" | "PROCESSING" => GenerationStatus::Generating,
        _ => GenerationStatus::Queued,
    }
}

/// Pull the video URL out of a task's `output` field.
///
/// Accepts an array of `{ "url": .. }` objects, an array of strings, a
/// single object with `url`, or a bare string. The first entry wins.
pub fn extract_output_url(output: &Value) -> Option<String> {
    let candidate = match output {
        Value::Array(items) => items.first()?,
        other => other,
    };

    match candidate {
        Value::String(url) => Some(url.clone()),
        Value::Object(map) => map.get("url").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

//! Size guard for persisted graph state.
//!
//! Graph state is serialized JSON. Before persisting, the stringified form
//! is measured: above [`MAX_STATE_BYTES`] it is gzip-compressed and wrapped
//! in an envelope; if the compressed form is still over the cap, the state
//! is reduced by dropping reproducible payloads (accumulated skill outputs
//! and agent transcripts) while keeping the clause index, findings, and
//! pending diffs.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::io::{Read, Write};
use tracing::warn;

/// Maximum stored size of a serialized graph state: 5 MiB.
pub const MAX_STATE_BYTES: usize = 5 * 1024 * 1024;

/// How many of the most recently reviewed clauses keep their skill outputs
/// when the state has to be reduced.
const KEEP_RECENT_SKILL_CONTEXTS: usize = 3;

const ENVELOPE_ENCODING: &str = "gzip+base64";

/// Apply the size guard, returning a value whose serialized size fits the
/// cap. Small states pass through untouched.
pub fn bound_graph_state(state: &Value) -> Value {
    let raw = state.to_string();
    if raw.len() <= MAX_STATE_BYTES {
        return state.clone();
    }

    let compressed = compress(raw.as_bytes());
    let envelope = json!({
        "encoding": ENVELOPE_ENCODING,
        "data": BASE64.encode(&compressed),
    });
    if envelope.to_string().len() <= MAX_STATE_BYTES {
        return envelope;
    }

    warn!(
        raw_bytes = raw.len(),
        "graph state exceeds cap even compressed, dropping reproducible fields"
    );
    let stripped = strip_reproducible(state.clone());
    let raw = stripped.to_string();
    if raw.len() <= MAX_STATE_BYTES {
        return stripped;
    }
    let compressed = compress(raw.as_bytes());
    json!({
        "encoding": ENVELOPE_ENCODING,
        "data": BASE64.encode(&compressed),
    })
}

/// Reverse [`bound_graph_state`]: unwrap the compression envelope when
/// present, otherwise return the value as-is.
pub fn unbound_graph_state(stored: &Value) -> Value {
    let Some(encoding) = stored.get("encoding").and_then(Value::as_str) else {
        return stored.clone();
    };
    if encoding != ENVELOPE_ENCODING {
        return stored.clone();
    }
    let Some(data) = stored.get("data").and_then(Value::as_str) else {
        return stored.clone();
    };
    let Ok(compressed) = BASE64.decode(data) else {
        warn!("compressed graph state envelope is not valid base64");
        return Value::Null;
    };
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut raw = String::new();
    if decoder.read_to_string(&mut raw).is_err() {
        warn!("compressed graph state failed to decompress");
        return Value::Null;
    }
    serde_json::from_str(&raw).unwrap_or(Value::Null)
}

fn compress(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    // Writing to a Vec cannot fail.
    let _ = encoder.write_all(bytes);
    encoder.finish().unwrap_or_default()
}

/// Drop skill outputs and transcripts that the graph can reproduce,
/// keeping the outputs of the most recently reviewed clauses.
fn strip_reproducible(mut state: Value) -> Value {
    let current_index = state
        .get("current_clause_index")
        .and_then(Value::as_u64)
        .unwrap_or(0) as usize;
    let recent_ids: Vec<String> = state
        .get("checklist")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter(|(i, _)| i + KEEP_RECENT_SKILL_CONTEXTS >= current_index.max(1))
                .filter(|(i, _)| *i < current_index.max(1))
                .filter_map(|(_, item)| {
                    item.get("clause_id").and_then(Value::as_str).map(String::from)
                })
                .collect()
        })
        .unwrap_or_default();

    if let Some(findings) = state.get_mut("findings").and_then(Value::as_object_mut) {
        for (clause_id, entry) in findings.iter_mut() {
            if recent_ids.iter().any(|id| id == clause_id) {
                continue;
            }
            if let Some(obj) = entry.as_object_mut() {
                obj.insert("skill_context".to_string(), json!({}));
            }
        }
    }
    if let Some(obj) = state.as_object_mut() {
        obj.remove("transcripts");
    }
    state
}

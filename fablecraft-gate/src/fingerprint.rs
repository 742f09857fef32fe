//! Request Fingerprinting
//!
//! Derives a stable, order-independent key from a request's identifying
//! parameters. The same key correlates cache entries and in-flight
//! computations, so two logically identical requests must always hash
//! to the same fingerprint regardless of parameter ordering.
//!
//! Auth material never reaches this module (callers pass only routing
//! parameters), and a fixed set of volatile parameter names is dropped
//! before hashing. The normalized body is included whenever the caller
//! supplies one - the gate passes the body for any route it treats as
//! cacheable, for every HTTP method.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Query/body parameter names that vary per call without changing the
/// logical request (cache-busting timestamps, correlation ids).
const VOLATILE_PARAMS: &[&str] = &["timestamp", "request_id", "_"];

/// A derived request fingerprint.
///
/// Displayed as `METHOD path#digest` so cache/coordination logs stay
/// readable while the digest carries the full identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    /// Compute the fingerprint of a request.
    ///
    /// `query` is normalized through its `BTreeMap` ordering; `body`
    /// (when present) is canonicalized with recursively sorted object
    /// keys before hashing.
    pub fn compute(
        method: &str,
        path: &str,
        query: &BTreeMap<String, String>,
        body: Option<&Value>,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(b"|");
        hasher.update(path.as_bytes());

        for (name, value) in query {
            if VOLATILE_PARAMS.contains(&name.as_str()) {
                continue;
            }
            hasher.update(b"|");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }

        if let Some(body) = body {
            let mut canonical = String::new();
            canonicalize(body, &mut canonical);
            hasher.update(b"|");
            hasher.update(canonical.as_bytes());
        }

        let digest = hex::encode(hasher.finalize());
        Self(format!("{} {}#{}", method, path, digest))
    }

    /// The fingerprint as a map key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Write a canonical rendering of a JSON value: object keys sorted
/// recursively, volatile top-level keys already filtered by the caller.
fn canonicalize(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|k| !VOLATILE_PARAMS.contains(&k.as_str()))
                .collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(key);
                out.push(':');
                canonicalize(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonicalize(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

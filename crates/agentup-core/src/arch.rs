//! Architecture bucket normalization.
//!
//! Release assets are keyed by a normalized architecture tag; device-reported
//! tags vary (`arm64-v8a` vs `arm64`) and must land in the same bucket.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized key used to look up the release asset for a device CPU
/// architecture.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchBucket(String);

impl ArchBucket {
    /// Normalize a raw architecture tag:
    /// - whitespace is stripped;
    /// - `arm64` / `arm64-v8a` collapse to `arm64`;
    /// - `armeabi-v7a` collapses to `arm`;
    /// - every other tag is kept verbatim.
    pub fn normalize(raw: &str) -> Self {
        let tag: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let bucket = match tag.as_str() {
            "arm64" | "arm64-v8a" => "arm64",
            "armeabi-v7a" => "arm",
            other => other,
        };
        Self(bucket.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

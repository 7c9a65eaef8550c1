//! Release payload parsing: GitHub release JSON → [`AgentRelease`].

use agentup_core::arch::ArchBucket;
use agentup_core::types::AgentRelease;
use serde_json::Value;

use crate::error::ReleaseError;

/// Parse a GitHub-style release object.
///
/// Only assets whose name starts with `asset_prefix` and contains
/// `platform_tag` are considered; the architecture tag is everything after
/// `"<platform_tag>-"` up to the first extension dot, normalized into its
/// bucket. Assets for the same bucket keep the first occurrence.
pub fn parse_release(
    json: &Value,
    asset_prefix: &str,
    platform_tag: &str,
) -> Result<AgentRelease, ReleaseError> {
    let version = json
        .get("tag_name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .ok_or_else(|| ReleaseError::Malformed("missing tag_name".to_string()))?
        .to_string();

    let mut release = AgentRelease {
        version,
        assets: Default::default(),
    };

    let Some(assets) = json.get("assets").and_then(Value::as_array) else {
        return Ok(release);
    };

    let platform_marker = format!("{platform_tag}-");
    for asset in assets {
        let Some(name) = asset.get("name").and_then(Value::as_str) else {
            continue;
        };
        if !name.starts_with(asset_prefix) || !name.contains(platform_tag) {
            continue;
        }
        let Some(tag_start) = name.find(&platform_marker) else {
            continue;
        };
        let raw_arch = &name[tag_start + platform_marker.len()..];
        let raw_arch = raw_arch.split('.').next().unwrap_or(raw_arch);
        if raw_arch.is_empty() {
            continue;
        }

        let Some(locator) = asset
            .get("browser_download_url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
        else {
            continue;
        };

        release
            .assets
            .entry(ArchBucket::normalize(raw_arch))
            .or_insert_with(|| locator.to_string());
    }

    Ok(release)
}

//! Release fetching. The trait seam keeps the cache testable without a
//! network; the real implementation talks to a GitHub releases endpoint.

use std::time::Duration;

use agentup_core::types::AgentRelease;
use serde_json::Value;

use crate::assets::parse_release;
use crate::error::ReleaseError;

/// Trait for fetching the latest agent release. Enables mock injection for
/// testing. Blocks on network IO — callers dispatch from a blocking task.
pub trait ReleaseFetcher: Send + Sync {
    fn fetch_latest(&self) -> Result<AgentRelease, ReleaseError>;
}

impl<T: ReleaseFetcher + ?Sized> ReleaseFetcher for &T {
    fn fetch_latest(&self) -> Result<AgentRelease, ReleaseError> {
        (**self).fetch_latest()
    }
}

/// Real fetcher against a GitHub `releases/latest` endpoint.
pub struct GithubReleaseFetcher {
    endpoint: String,
    asset_prefix: String,
    platform_tag: String,
    client: reqwest::blocking::Client,
}

impl GithubReleaseFetcher {
    pub fn new(
        endpoint: impl Into<String>,
        asset_prefix: impl Into<String>,
        platform_tag: impl Into<String>,
    ) -> Result<Self, ReleaseError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("agentup")
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            asset_prefix: asset_prefix.into(),
            platform_tag: platform_tag.into(),
            client,
        })
    }
}

impl ReleaseFetcher for GithubReleaseFetcher {
    fn fetch_latest(&self) -> Result<AgentRelease, ReleaseError> {
        let json: Value = self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/vnd.github+json")
            .send()?
            .error_for_status()?
            .json()?;
        parse_release(&json, &self.asset_prefix, &self.platform_tag)
    }
}

//! agentup-releases: agent release resolution.
//! Fetches the latest agent release from a GitHub-style endpoint, maps
//! assets to architecture buckets, and caches the result on disk with a
//! 15-minute TTL. Network unreachable is never an error here — resolution
//! degrades to the cached value, then to a hardcoded default.

pub mod assets;
pub mod cache;
pub mod error;
pub mod fetch;

pub use assets::parse_release;
pub use cache::{CacheConfig, DEFAULT_AGENT_VERSION, RELEASE_CACHE_TTL, ReleaseCache};
pub use error::ReleaseError;
pub use fetch::{GithubReleaseFetcher, ReleaseFetcher};

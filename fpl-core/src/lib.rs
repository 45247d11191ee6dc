pub mod cache;
pub mod client;
pub mod compare;
pub mod config;
pub mod detector;
pub mod error;
pub mod models;
pub mod poller;
pub mod scoring;
pub mod storage;

pub use cache::{CacheKey, ResourceCache, ResourceType};
pub use client::FplClient;
pub use compare::{ComparisonEngine, ComparisonResult};
pub use config::AppConfig;
pub use detector::{ChangeDetector, ChangeEvent, ChangeType, CycleOutcome};
pub use error::FplError;
pub use poller::{spawn_detector, PollConfig, PollerHandle};
pub use scoring::{LiveScoreView, LiveScoringEngine, LiveStat, ScoredPick};
pub use storage::{CacheStore, MemoryStore};
#[cfg(feature = "redis")]
pub use storage::RedisStore;

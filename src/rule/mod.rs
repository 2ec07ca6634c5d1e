//! 规则子系统：核心模型、完整性校验、归一化、取数与缓存中枢

pub mod cache;
pub mod core;
pub mod integrity;
pub mod loader;
pub mod normalizer;

pub use cache::{DirStore, MemoryStore, RuleHub, RuleStore};
pub use core::{RuleCategory, RuleRecord, RuleSetResponse, RuleSource, RuleUpdateEvent};
pub use loader::{FallbackLoader, HttpFetch, Manifest, ManifestFetcher, RemoteRuleFetcher};

//! 规则缓存与中枢协调

pub mod rule_hub;
pub mod store;

pub use rule_hub::RuleHub;
pub use store::{DirStore, MemoryStore, RuleStore};

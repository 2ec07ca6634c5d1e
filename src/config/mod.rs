//! 全局配置管理

pub mod hub;

pub use hub::{HubConfig, HubConfigBuilder, RetryPolicy};

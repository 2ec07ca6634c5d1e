//! quietweb - 内容拦截扩展的规则分发与完整性校验内核
//!
//! 职责边界：拉取摘要清单 → 逐字节校验规则载荷 → 归一化为固定内部形态 →
//! 按来源差异化 TTL 缓存 → 向消费方广播变更。DOM 启发式、弹窗点击模拟、
//! UI 渲染等均为本内核的外部协作方，只通过 [`RuleHub`] 的窄接口消费产出。

pub mod config;
pub mod error;
pub mod rule;

// 导出全局错误类型
pub use self::error::{QuietwebError, QwResult};

// 导出配置模块核心结构体与构建器
pub use crate::config::{HubConfig, HubConfigBuilder, RetryPolicy};

// 导出规则模块核心接口与数据结构
pub use crate::rule::cache::{DirStore, MemoryStore, RuleHub, RuleStore};
pub use crate::rule::core::{
    CookieRules, DomEntry, DomRuleList, FallbackPattern, LocaleBucket, RuleCategory, RulePayload,
    RuleRecord, RuleSetResponse, RuleSource, RuleUpdateEvent, TermRules, WidgetRules,
};
pub use crate::rule::loader::{
    FallbackLoader, HttpFetch, Manifest, ManifestEntry, ManifestFetcher, RemoteRuleFetcher,
    ReqwestFetcher,
};
pub use crate::rule::normalizer::normalize;
pub use crate::rule::integrity::{sha256_hex, verify};

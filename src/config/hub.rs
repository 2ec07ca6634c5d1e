//! 规则中枢配置
//! TTL 按数据来源差异化：清单小且是新鲜度判断的事实来源，用最短 TTL；
//! 已验证的远程数据可以放心用较长 TTL；兜底/失败态是需要尽快逃离的降级态，
//! 用最短的重试窗口

use std::time::Duration;

/// 官方规则分发源
pub const DEFAULT_MANIFEST_URL: &str =
    "https://rules.quietweb.app/v1/manifest.json";
/// 清单不可用时的直连规则基址（无摘要校验的降级通道）
pub const DEFAULT_RULE_BASE_URL: &str = "https://rules.quietweb.app/v1";

/// 重试策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
    Never,     // 不重试
    Times(u8), // 固定次数重试（不含第一次）
}

impl RetryPolicy {
    pub fn max_retries(&self) -> usize {
        match self {
            RetryPolicy::Never => 0,
            RetryPolicy::Times(n) => *n as usize,
        }
    }
}

/// 规则中枢完整配置
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// 清单 URL
    pub manifest_url: String,
    /// 清单缺失条目时的直连基址
    pub rule_base_url: String,
    /// 单次远程请求超时
    pub fetch_timeout: Duration,
    /// HTTP 重试策略
    pub retry: RetryPolicy,
    /// 清单缓存 TTL
    pub manifest_ttl: Duration,
    /// 已验证远程数据 TTL
    pub remote_ttl: Duration,
    /// 兜底数据 / 刷新失败后的重试窗口
    pub fallback_retry: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            rule_base_url: DEFAULT_RULE_BASE_URL.to_string(),
            fetch_timeout: Duration::from_secs(8),
            retry: RetryPolicy::Never,
            manifest_ttl: Duration::from_secs(60 * 60),
            remote_ttl: Duration::from_secs(6 * 60 * 60),
            fallback_retry: Duration::from_secs(15 * 60),
        }
    }
}

impl HubConfig {
    /// 分类的直连 URL（清单不可用时使用，无摘要可校验）
    pub fn default_url_for(&self, category: crate::rule::core::RuleCategory) -> String {
        format!(
            "{}/{}",
            self.rule_base_url.trim_end_matches('/'),
            category.file_name()
        )
    }
}

/// 自定义构建器（链式 API）
#[derive(Debug, Clone, Default)]
pub struct HubConfigBuilder {
    config: HubConfig,
}

impl HubConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest_url(mut self, url: impl Into<String>) -> Self {
        self.config.manifest_url = url.into();
        self
    }

    pub fn rule_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.rule_base_url = url.into();
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn manifest_ttl(mut self, ttl: Duration) -> Self {
        self.config.manifest_ttl = ttl;
        self
    }

    pub fn remote_ttl(mut self, ttl: Duration) -> Self {
        self.config.remote_ttl = ttl;
        self
    }

    pub fn fallback_retry(mut self, window: Duration) -> Self {
        self.config.fallback_retry = window;
        self
    }

    pub fn build(self) -> HubConfig {
        self.config
    }
}

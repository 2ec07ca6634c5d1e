//! 全局错误类型定义
//! 规则分发管线的错误分层：网络/完整性/归一化错误在取数边界被兜底消化，
//! 只有"彻底无数据可用"才会穿透到消费方
use thiserror::Error;

use crate::rule::core::RuleCategory;
use std::time::Duration;
use url::ParseError as UrlParseError;

#[derive(Error, Debug)]
pub enum QuietwebError {
    // ===================== 远程取数错误 =====================
    /// 远程请求超时（与普通网络错误区分，便于定位慢源）
    #[error("Remote fetch timed out after {timeout:?}: {url}")]
    Timeout { url: String, timeout: Duration },

    /// HTTP 非成功状态码
    #[error("HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// 网络传输层错误（连接失败、TLS 等）
    #[error("Network error for {url}: {detail}")]
    Network { url: String, detail: String },

    // ===================== 数据校验错误 =====================
    /// 响应体不是合法 JSON
    #[error("JSON parse failed for {context}: {detail}")]
    JsonParse { context: String, detail: String },

    /// 摘要校验失败（安全相关，绝不静默降级）
    #[error("Integrity check failed for [{category}]: expected {expected}.., got {actual}..")]
    Integrity {
        category: RuleCategory,
        expected: String,
        actual: String,
    },

    /// 归一化发现必填字段缺失或非法
    #[error("Schema invalid for [{category}]: field '{field}' {reason}")]
    Schema {
        category: RuleCategory,
        field: String,
        reason: String,
    },

    /// 内置兜底数据也不可用（产品层面已无任何可服务数据）
    #[error("No usable fallback data for [{category}]: {detail}")]
    FallbackUnavailable {
        category: RuleCategory,
        detail: String,
    },

    // ===================== 基础错误 =====================
    /// 持久化存储读写失败（底层 IO 错误在存储实现处折叠为可读文本）
    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("URL parse failed: {0}")]
    Url(#[from] UrlParseError),
}

// 全局Result类型
pub type QwResult<T> = Result<T, QuietwebError>;

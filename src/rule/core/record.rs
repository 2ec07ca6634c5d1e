//! 规则记录与消费方接口数据结构

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

use super::category::{RuleCategory, RuleSource};
use super::payload::RulePayload;

/// 当前 Unix 时间戳（秒）
/// 系统时钟早于纪元按 0 处理，不让时钟异常打断取数链路
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 单分类缓存记录
/// 生命周期：首次成功取数/兜底加载时创建，每次成功刷新整体替换（绝不原地修改），
/// 消费方拿到的始终是克隆，不会触及缓存内的共享状态
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub category: RuleCategory,
    pub data: RulePayload,
    pub source: RuleSource,
    /// 实际取数 URL（兜底数据为内置路径标识）
    pub origin_url: String,
    /// 取数完成时间（Unix 秒）
    pub fetched_at: u64,
    /// 最近一次刷新失败的描述（成功刷新后清空）
    #[serde(default)]
    pub last_error: Option<String>,
    /// 最近一次刷新失败时间（用于 15 分钟重试退避）
    #[serde(default)]
    pub last_failure_at: Option<u64>,
    /// 是否通过摘要校验
    pub verified: bool,
    /// 校验通过的 SHA-256 摘要（未校验为 None）
    #[serde(default)]
    pub digest: Option<String>,
}

impl RuleRecord {
    /// 记录一次失败刷新：整体替换出一条携带失败元信息的新记录，
    /// 数据本体保持上一次的已验证内容不变
    pub fn with_failure(&self, error: &str, at: u64) -> RuleRecord {
        let mut next = self.clone();
        next.last_error = Some(error.to_string());
        next.last_failure_at = Some(at);
        next
    }
}

/// 消费方请求接口的返回体（深拷贝，非缓存活引用）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSetResponse {
    pub category: RuleCategory,
    pub data: RulePayload,
    pub source: RuleSource,
    pub fetched_at: u64,
    pub verified: bool,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl From<&RuleRecord> for RuleSetResponse {
    fn from(rec: &RuleRecord) -> Self {
        RuleSetResponse {
            category: rec.category,
            data: rec.data.clone(),
            source: rec.source,
            fetched_at: rec.fetched_at,
            verified: rec.verified,
            last_error: rec.last_error.clone(),
        }
    }
}

/// 规则变更广播事件
/// 仅在归一化载荷发生结构性变化时发出，内容未变的刷新不打扰消费方
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleUpdateEvent {
    pub category: RuleCategory,
    pub source: RuleSource,
    pub fetched_at: u64,
}

impl RuleUpdateEvent {
    /// 扩展消息通道上的线格式
    pub fn to_message(&self) -> serde_json::Value {
        json!({
            "type": "RULES_UPDATED",
            "category": self.category.as_str(),
            "source": self.source.to_string(),
            "fetchedAt": self.fetched_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::core::payload::TermRules;

    #[test]
    fn test_record_failure_replacement() {
        let rec = RuleRecord {
            category: RuleCategory::AiTerms,
            data: RulePayload::AiTerms(TermRules {
                terms: vec!["chatbot".into()],
                phrases: vec![],
            }),
            source: RuleSource::RemoteVerified,
            origin_url: "https://rules.example/ai_terms.json".into(),
            fetched_at: 1000,
            last_error: None,
            last_failure_at: None,
            verified: true,
            digest: Some("ab".repeat(32)),
        };

        let failed = rec.with_failure("HTTP status 503", 2000);
        // 数据本体不动，失败元信息落在新记录上
        assert_eq!(failed.data, rec.data);
        assert_eq!(failed.fetched_at, 1000);
        assert_eq!(failed.last_error.as_deref(), Some("HTTP status 503"));
        assert_eq!(failed.last_failure_at, Some(2000));
        assert!(rec.last_error.is_none());
    }

    #[test]
    fn test_update_event_wire_format() {
        let event = RuleUpdateEvent {
            category: RuleCategory::KillList,
            source: RuleSource::RemoteVerified,
            fetched_at: 42,
        };
        let msg = event.to_message();
        assert_eq!(msg["type"], "RULES_UPDATED");
        assert_eq!(msg["category"], "killList");
        assert_eq!(msg["source"], "remote-verified");
        assert_eq!(msg["fetchedAt"], 42);
    }
}

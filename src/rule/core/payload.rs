//! 归一化后的规则载荷定义
//! 五类规则各自固定一种内部形态；缓存与消费方只见到这里的类型，
//! 原始 JSON 的各种历史形态在归一化层被抹平

use serde::{Deserialize, Serialize};

use super::category::RuleCategory;

/// 归一化载荷（按分类封闭枚举）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RulePayload {
    AiTerms(TermRules),
    AiWidgets(WidgetRules),
    CookiePatterns(CookieRules),
    KillList(DomRuleList),
    PreserveList(DomRuleList),
}

impl RulePayload {
    pub fn category(&self) -> RuleCategory {
        match self {
            RulePayload::AiTerms(_) => RuleCategory::AiTerms,
            RulePayload::AiWidgets(_) => RuleCategory::AiWidgets,
            RulePayload::CookiePatterns(_) => RuleCategory::CookiePatterns,
            RulePayload::KillList(_) => RuleCategory::KillList,
            RulePayload::PreserveList(_) => RuleCategory::PreserveList,
        }
    }

    /// 主列表长度（日志/统计用）
    pub fn primary_len(&self) -> usize {
        match self {
            RulePayload::AiTerms(t) => t.terms.len(),
            RulePayload::AiWidgets(w) => w.selectors.len(),
            RulePayload::CookiePatterns(c) => c.banner_selectors.len(),
            RulePayload::KillList(d) | RulePayload::PreserveList(d) => d.combined.len(),
        }
    }
}

/// AI 术语词典
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermRules {
    /// 单词级术语（主列表）
    pub terms: Vec<String>,
    /// 多词短语（可选，匹配优先级高于单词）
    #[serde(default)]
    pub phrases: Vec<String>,
}

/// AI 聊天挂件选择器集
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetRules {
    /// CSS 选择器（主列表）
    pub selectors: Vec<String>,
    /// 启发式关键词（辅助识别 iframe/shadow 容器）
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Cookie 同意弹窗匹配模式
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRules {
    /// 弹窗容器选择器（主列表）
    pub banner_selectors: Vec<String>,
    /// "拒绝"按钮文案模式
    #[serde(default)]
    pub reject_text: Vec<String>,
    /// "接受"按钮文案模式（仅在无拒绝入口时兜底点击）
    #[serde(default)]
    pub accept_text: Vec<String>,
}

/// DOM 清单（kill-list / preserve-list 共用）
/// 同时保留按地区分桶视图与拍平后的合并视图，
/// 不关心地区的消费方直接读 combined
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomRuleList {
    pub locales: Vec<LocaleBucket>,
    pub combined: Vec<DomEntry>,
}

/// 地区分桶
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleBucket {
    pub locale: String,
    #[serde(default)]
    pub title: Option<String>,
    pub entries: Vec<DomEntry>,
}

/// 单条 DOM 规则
/// selector 为匹配正确性的唯一依据；其余字段只影响可审计性
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomEntry {
    /// CSS 选择器（必填、非空）
    pub selector: String,
    /// 选择器失效时的兜底识别模式
    #[serde(default)]
    pub fallback_patterns: Option<FallbackPattern>,
    /// 命中节点须包含的验证文本（防误杀）
    #[serde(default)]
    pub text_contains: Option<String>,
    /// 出处站点（审计元信息）
    #[serde(default)]
    pub site: Option<String>,
    /// 备注（审计元信息）
    #[serde(default)]
    pub notes: Option<String>,
}

/// 兜底识别模式；id/class 均可缺省
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackPattern {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
}

impl FallbackPattern {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.class.is_none()
    }
}

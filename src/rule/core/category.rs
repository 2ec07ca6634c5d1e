//! 规则分类与来源枚举

use serde::{Deserialize, Serialize};
use std::fmt;

/// 规则分类（固定五类）
/// 分类决定归一化模式与远程/内置数据源的配对
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleCategory {
    /// AI 术语词典（文本脱敏用）
    AiTerms,
    /// AI 聊天挂件选择器
    AiWidgets,
    /// Cookie 同意弹窗匹配模式
    CookiePatterns,
    /// DOM 移除清单（kill-list）
    KillList,
    /// DOM 保留清单（safelist，优先级最高，永不移除）
    PreserveList,
}

impl RuleCategory {
    /// 全部分类（刷新遍历顺序固定，便于日志对照）
    pub const ALL: [RuleCategory; 5] = [
        RuleCategory::AiTerms,
        RuleCategory::AiWidgets,
        RuleCategory::CookiePatterns,
        RuleCategory::KillList,
        RuleCategory::PreserveList,
    ];

    /// 线上清单/消息协议中的分类键名
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::AiTerms => "aiTerms",
            RuleCategory::AiWidgets => "aiWidgets",
            RuleCategory::CookiePatterns => "cookiePatterns",
            RuleCategory::KillList => "killList",
            RuleCategory::PreserveList => "preserveList",
        }
    }

    /// 从键名解析（未知键返回 None，保持前向兼容）
    pub fn from_str(s: &str) -> Option<RuleCategory> {
        match s {
            "aiTerms" => Some(RuleCategory::AiTerms),
            "aiWidgets" => Some(RuleCategory::AiWidgets),
            "cookiePatterns" => Some(RuleCategory::CookiePatterns),
            "killList" => Some(RuleCategory::KillList),
            "preserveList" => Some(RuleCategory::PreserveList),
            _ => None,
        }
    }

    /// 主列表是否要求非空
    /// PreserveList 例外：空的保留清单是合法语义（没有需要豁免的节点），
    /// 而空的 kill-list/术语表意味着上游数据已损坏
    pub fn primary_must_be_nonempty(&self) -> bool {
        !matches!(self, RuleCategory::PreserveList)
    }

    /// 远程与内置数据共用的文件名
    pub fn file_name(&self) -> &'static str {
        match self {
            RuleCategory::AiTerms => "ai_terms.json",
            RuleCategory::AiWidgets => "ai_widgets.json",
            RuleCategory::CookiePatterns => "cookie_patterns.json",
            RuleCategory::KillList => "kill_list.json",
            RuleCategory::PreserveList => "preserve_list.json",
        }
    }

    /// 主列表字段名（用于 Schema 错误提示）
    pub fn primary_field(&self) -> &'static str {
        match self {
            RuleCategory::AiTerms => "terms",
            RuleCategory::AiWidgets => "selectors",
            RuleCategory::CookiePatterns => "bannerSelectors",
            RuleCategory::KillList | RuleCategory::PreserveList => "entries",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 规则数据来源（决定缓存 TTL）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleSource {
    /// 远程拉取（经摘要校验或清单不可用时未校验）
    RemoteVerified,
    /// 构建期内置的兜底数据
    LocalFallback,
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::RemoteVerified => f.write_str("remote-verified"),
            RuleSource::LocalFallback => f.write_str("local-fallback"),
        }
    }
}

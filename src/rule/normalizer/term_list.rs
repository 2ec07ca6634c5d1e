//! 列表型分类的归一化（AI 术语 / AI 挂件 / Cookie 模式）
//! 两种已知输入变体：纯字符串数组（早期格式）与带字段的对象（当前格式）

use serde_json::Value;

use super::{missing_field, string_list};
use crate::error::QwResult;
use crate::rule::core::{CookieRules, RuleCategory, TermRules, WidgetRules};

/// AI 术语词典归一化
/// 变体：`["term", ...]` 或 `{terms: [...], phrases: [...]}`
pub fn normalize_terms(raw: &Value) -> QwResult<TermRules> {
    let category = RuleCategory::AiTerms;

    if raw.is_array() {
        // 早期格式：整个文档就是术语数组
        let wrapped = serde_json::json!({ "terms": raw });
        let terms = string_list(&wrapped, "terms")
            .ok_or_else(|| missing_field(category, "terms"))?;
        return Ok(TermRules {
            terms,
            phrases: Vec::new(),
        });
    }

    let terms = string_list(raw, "terms").ok_or_else(|| missing_field(category, "terms"))?;
    let phrases = string_list(raw, "phrases").unwrap_or_default();

    Ok(TermRules { terms, phrases })
}

/// AI 挂件选择器归一化
/// 变体：`["#sel", ...]` 或 `{selectors: [...], keywords: [...]}`
pub fn normalize_widgets(raw: &Value) -> QwResult<WidgetRules> {
    let category = RuleCategory::AiWidgets;

    if raw.is_array() {
        let wrapped = serde_json::json!({ "selectors": raw });
        let selectors = string_list(&wrapped, "selectors")
            .ok_or_else(|| missing_field(category, "selectors"))?;
        return Ok(WidgetRules {
            selectors,
            keywords: Vec::new(),
        });
    }

    let selectors =
        string_list(raw, "selectors").ok_or_else(|| missing_field(category, "selectors"))?;
    let keywords = string_list(raw, "keywords").unwrap_or_default();

    Ok(WidgetRules {
        selectors,
        keywords,
    })
}

/// Cookie 同意弹窗模式归一化
/// 仅对象格式；bannerSelectors 兼容历史键名 selectors
pub fn normalize_cookie_patterns(raw: &Value) -> QwResult<CookieRules> {
    let category = RuleCategory::CookiePatterns;

    let banner_selectors = string_list(raw, "bannerSelectors")
        .or_else(|| string_list(raw, "selectors"))
        .ok_or_else(|| missing_field(category, "bannerSelectors"))?;
    let reject_text = string_list(raw, "rejectText").unwrap_or_default();
    let accept_text = string_list(raw, "acceptText").unwrap_or_default();

    Ok(CookieRules {
        banner_selectors,
        reject_text,
        accept_text,
    })
}

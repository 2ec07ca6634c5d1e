//! 规则归一化器
//! 将上游各种历史形态的原始 JSON 收敛为每分类唯一的内部形态：
//! 先探测输入属于哪种已知变体，再分派到对应转换例程，
//! 未知/多余字段一律忽略（前向兼容更丰富的上游编排格式）

mod dom_list;
mod term_list;

use serde_json::Value;

use crate::error::{QuietwebError, QwResult};
use crate::rule::core::{RuleCategory, RulePayload};

/// 归一化入口：原始 JSON → 该分类的规范载荷
/// 必填数组缺失、或主列表按分类策略要求非空但结果为空时，
/// 返回携带分类与字段名的 Schema 错误
pub fn normalize(category: RuleCategory, raw: &Value) -> QwResult<RulePayload> {
    let payload = match category {
        RuleCategory::AiTerms => RulePayload::AiTerms(term_list::normalize_terms(raw)?),
        RuleCategory::AiWidgets => RulePayload::AiWidgets(term_list::normalize_widgets(raw)?),
        RuleCategory::CookiePatterns => {
            RulePayload::CookiePatterns(term_list::normalize_cookie_patterns(raw)?)
        }
        RuleCategory::KillList => RulePayload::KillList(dom_list::normalize_dom_list(
            RuleCategory::KillList,
            raw,
        )?),
        RuleCategory::PreserveList => RulePayload::PreserveList(dom_list::normalize_dom_list(
            RuleCategory::PreserveList,
            raw,
        )?),
    };

    // 分类级主列表非空校验（逐条丢弃后的最终检查）
    if category.primary_must_be_nonempty() && payload.primary_len() == 0 {
        return Err(QuietwebError::Schema {
            category,
            field: category.primary_field().to_string(),
            reason: "is empty after normalization".to_string(),
        });
    }

    Ok(payload)
}

/// 提取字符串数组字段：仅保留非空字符串项，非字符串项丢弃并告警
/// 字段整体缺失或类型不是数组时返回 None，由调用方决定是否致命
pub(crate) fn string_list(raw: &Value, field: &str) -> Option<Vec<String>> {
    let arr = raw.get(field)?.as_array()?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        match item.as_str() {
            Some(s) if !s.trim().is_empty() => out.push(s.trim().to_string()),
            _ => {
                log::warn!("Dropping non-string or empty item in field '{}'", field);
            }
        }
    }
    Some(out)
}

pub(crate) fn missing_field(category: RuleCategory, field: &str) -> QuietwebError {
    QuietwebError::Schema {
        category,
        field: field.to_string(),
        reason: "is missing or not an array".to_string(),
    }
}

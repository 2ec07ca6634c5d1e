//! DOM 清单归一化（kill-list / preserve-list）
//! 三种已知输入变体：
//! A. 扁平条目数组                    `[{selector, ...}, ...]`
//! B. 分桶数组                        `[{locale, title, entries: [...]}, ...]`
//! C. 地区映射                        `{"en": [...] | {title, entries}, ...}`
//! 统一产出"按地区分桶 + 拍平合并"双视图；缺 selector 的条目丢弃并告警，
//! 整个分类丢空后是否致命由分类策略决定（见 normalizer/mod.rs）

use serde_json::Value;

use super::missing_field;
use crate::error::QwResult;
use crate::rule::core::{DomEntry, DomRuleList, FallbackPattern, LocaleBucket, RuleCategory};

/// 输入变体标签（先探测后分派）
enum InputShape<'a> {
    FlatEntries(&'a [Value]),
    BucketArray(&'a [Value]),
    LocaleMap(&'a serde_json::Map<String, Value>),
}

/// DOM 清单归一化入口
pub fn normalize_dom_list(category: RuleCategory, raw: &Value) -> QwResult<DomRuleList> {
    let shape = detect_shape(raw).ok_or_else(|| missing_field(category, "entries"))?;

    let locales = match shape {
        InputShape::FlatEntries(arr) => {
            // 无地区信息，归入单一默认桶
            vec![convert_bucket(category, "default", None, arr)]
        }
        InputShape::BucketArray(arr) => arr
            .iter()
            .filter_map(|bucket| convert_bucket_object(category, bucket))
            .collect(),
        InputShape::LocaleMap(map) => map
            .iter()
            .filter_map(|(locale, val)| convert_locale_value(category, locale, val))
            .collect(),
    };

    let combined = locales
        .iter()
        .flat_map(|bucket| bucket.entries.iter().cloned())
        .collect();

    Ok(DomRuleList { locales, combined })
}

/// 形态探测：数组看首元素是否带 entries 键，对象视作地区映射
fn detect_shape(raw: &Value) -> Option<InputShape<'_>> {
    match raw {
        Value::Array(arr) => {
            let is_bucketed = arr
                .first()
                .map(|v| v.is_object() && v.get("entries").is_some())
                .unwrap_or(false);
            if is_bucketed {
                Some(InputShape::BucketArray(arr.as_slice()))
            } else {
                Some(InputShape::FlatEntries(arr.as_slice()))
            }
        }
        Value::Object(map) => {
            if matches!(map.get("entries"), Some(Value::Array(_))) {
                // 单桶对象（历史格式）：{title?, entries: [...]}
                Some(InputShape::BucketArray(std::slice::from_ref(raw)))
            } else {
                Some(InputShape::LocaleMap(map))
            }
        }
        _ => None,
    }
}

/// 分桶对象 → LocaleBucket；entries 缺失或非数组时整桶丢弃并告警
fn convert_bucket_object(category: RuleCategory, bucket: &Value) -> Option<LocaleBucket> {
    let entries = match bucket.get("entries").and_then(Value::as_array) {
        Some(arr) => arr,
        None => {
            log::warn!("[{}] Dropping locale bucket without entries array", category);
            return None;
        }
    };
    let locale = bucket
        .get("locale")
        .and_then(Value::as_str)
        .unwrap_or("default");
    let title = bucket
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(convert_bucket(category, locale, title, entries))
}

/// 地区映射的值 → LocaleBucket（值可以是条目数组或 {title, entries} 对象）
fn convert_locale_value(category: RuleCategory, locale: &str, val: &Value) -> Option<LocaleBucket> {
    match val {
        Value::Array(arr) => Some(convert_bucket(category, locale, None, arr)),
        Value::Object(map) => {
            let entries = match map.get("entries").and_then(Value::as_array) {
                Some(arr) => arr,
                None => {
                    log::warn!(
                        "[{}] Dropping locale '{}' object without entries array",
                        category,
                        locale
                    );
                    return None;
                }
            };
            let title = map.get("title").and_then(Value::as_str).map(str::to_string);
            Some(convert_bucket(category, locale, title, entries))
        }
        _ => {
            log::warn!("[{}] Dropping locale '{}' with unsupported value shape", category, locale);
            None
        }
    }
}

fn convert_bucket(
    category: RuleCategory,
    locale: &str,
    title: Option<String>,
    raw_entries: &[Value],
) -> LocaleBucket {
    let entries = raw_entries
        .iter()
        .filter_map(|raw| convert_entry(category, raw))
        .collect();

    LocaleBucket {
        locale: locale.to_string(),
        title,
        entries,
    }
}

/// 单条目归一化；selector 缺失/空串即丢弃（局部数据优于整体失败）
fn convert_entry(category: RuleCategory, raw: &Value) -> Option<DomEntry> {
    let selector = match raw.get("selector").and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => {
            log::warn!("[{}] Dropping entry without a usable selector", category);
            return None;
        }
    };

    Some(DomEntry {
        selector,
        fallback_patterns: convert_fallback_patterns(raw.get("fallbackPatterns")),
        text_contains: raw
            .get("textContains")
            .and_then(Value::as_str)
            .map(str::to_string),
        site: raw.get("site").and_then(Value::as_str).map(str::to_string),
        notes: raw.get("notes").and_then(Value::as_str).map(str::to_string),
    })
}

/// 兜底识别模式归一化：对象收敛为 {id, class}，其余形态一律坍缩为 None
fn convert_fallback_patterns(raw: Option<&Value>) -> Option<FallbackPattern> {
    let map = raw?.as_object()?;
    let pattern = FallbackPattern {
        id: map.get("id").and_then(Value::as_str).map(str::to_string),
        class: map.get("class").and_then(Value::as_str).map(str::to_string),
    };
    if pattern.is_empty() {
        None
    } else {
        Some(pattern)
    }
}

//! 构建期内置的兜底规则加载
//! 与远程数据走同一个归一化器，兜底数据不享受任何模式宽松；
//! 此处失败意味着该分类彻底无数据可服务，必须上抛

use serde_json::Value;

use crate::error::{QuietwebError, QwResult};
use crate::rule::core::record::now_secs;
use crate::rule::core::{RuleCategory, RuleRecord, RuleSource};
use crate::rule::normalizer;

/// 兜底加载器
pub struct FallbackLoader;

impl FallbackLoader {
    /// 加载一个分类的内置兜底数据
    pub fn load_local(category: RuleCategory) -> QwResult<RuleRecord> {
        let source = packaged_source(category);
        let raw: Value =
            serde_json::from_str(source).map_err(|e| QuietwebError::FallbackUnavailable {
                category,
                detail: format!("packaged JSON invalid: {}", e),
            })?;

        // Schema 错误按原样上抛：兜底数据违约没有下一层可退
        let payload = normalizer::normalize(category, &raw)?;

        log::info!(
            "[{}] Loaded packaged fallback ({} primary entries)",
            category,
            payload.primary_len()
        );

        Ok(RuleRecord {
            category,
            data: payload,
            source: RuleSource::LocalFallback,
            origin_url: format!("packaged:{}", category.file_name()),
            fetched_at: now_secs(),
            last_error: None,
            last_failure_at: None,
            verified: false,
            digest: None,
        })
    }
}

/// 构建期打包的规则文件
fn packaged_source(category: RuleCategory) -> &'static str {
    match category {
        RuleCategory::AiTerms => include_str!("../../../data/ai_terms.json"),
        RuleCategory::AiWidgets => include_str!("../../../data/ai_widgets.json"),
        RuleCategory::CookiePatterns => include_str!("../../../data/cookie_patterns.json"),
        RuleCategory::KillList => include_str!("../../../data/kill_list.json"),
        RuleCategory::PreserveList => include_str!("../../../data/preserve_list.json"),
    }
}

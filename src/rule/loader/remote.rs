//! 单分类远程规则取数
//! 流程：清单定位（URL + 期望摘要）→ 有界拉取 → 摘要校验 → 解析归一化。
//! 摘要不匹配对本次取数是致命的，绝不静默接受；
//! 只有校验通过（或清单缺失导致无摘要可查）之后才解析 JSON

use serde_json::Value;
use std::sync::Arc;

use crate::config::HubConfig;
use crate::error::{QuietwebError, QwResult};
use crate::rule::core::record::now_secs;
use crate::rule::core::{RuleCategory, RuleRecord, RuleSource};
use crate::rule::integrity;
use crate::rule::loader::http::HttpFetch;
use crate::rule::loader::manifest::ManifestFetcher;
use crate::rule::normalizer;

/// 远程规则取数器
pub struct RemoteRuleFetcher {
    http: Arc<dyn HttpFetch>,
    manifest: ManifestFetcher,
    config: HubConfig,
}

impl RemoteRuleFetcher {
    pub fn new(http: Arc<dyn HttpFetch>, manifest: ManifestFetcher, config: HubConfig) -> Self {
        Self {
            http,
            manifest,
            config,
        }
    }

    /// 拉取并校验一个分类的远程规则
    /// 成功返回完整记录；失败返回区分超时/状态码/JSON/摘要的具体错误
    /// 强刷必须穿透清单缓存：上游同时更新载荷与清单时，
    /// 拿旧摘要校验新载荷会制造假的完整性失败
    pub async fn fetch_remote(
        &self,
        category: RuleCategory,
        force_refresh: bool,
    ) -> QwResult<RuleRecord> {
        // 1. 清单定位；清单不可用时退回直连 URL（无摘要，降级而非拒绝）
        let manifest = self.manifest.get_manifest(force_refresh).await;
        let (url, expected_digest, expected_size) =
            match manifest.as_ref().and_then(|m| m.entry_for(category)) {
                Some(entry) => (
                    entry.url.clone(),
                    Some(entry.sha256.clone()),
                    Some(entry.size),
                ),
                None => {
                    log::warn!(
                        "[{}] No manifest entry, fetching default URL without digest verification",
                        category
                    );
                    (self.config.default_url_for(category), None, None)
                }
            };

        // 2. 有界拉取（URL 先行校验，坏清单条目不触发请求）
        let url = url::Url::parse(&url)?.to_string();
        let bytes = self
            .http
            .fetch_bytes(&url, self.config.fetch_timeout)
            .await?;

        if let Some(size) = expected_size {
            if size != bytes.len() as u64 {
                // 摘要才是完整性依据，尺寸偏差只记录不拦截
                log::warn!(
                    "[{}] Payload size {} differs from manifest size {}",
                    category,
                    bytes.len(),
                    size
                );
            }
        }

        // 3. 摘要校验（先于任何解析）
        let verified = match &expected_digest {
            Some(expected) => {
                let actual = integrity::sha256_hex(&bytes);
                if !actual.eq_ignore_ascii_case(expected.trim()) {
                    return Err(QuietwebError::Integrity {
                        category,
                        expected: integrity::short_digest(expected).to_string(),
                        actual: integrity::short_digest(&actual).to_string(),
                    });
                }
                true
            }
            None => false,
        };

        // 4. 解析 + 归一化
        let raw: Value = serde_json::from_slice(&bytes).map_err(|e| QuietwebError::JsonParse {
            context: url.clone(),
            detail: e.to_string(),
        })?;
        let payload = normalizer::normalize(category, &raw)?;

        log::debug!(
            "[{}] Remote fetch ok from {} (verified: {}, primary entries: {})",
            category,
            url,
            verified,
            payload.primary_len()
        );

        Ok(RuleRecord {
            category,
            data: payload,
            source: RuleSource::RemoteVerified,
            origin_url: url,
            fetched_at: now_secs(),
            last_error: None,
            last_failure_at: None,
            verified,
            digest: if verified { expected_digest } else { None },
        })
    }
}

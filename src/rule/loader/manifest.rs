//! 摘要清单拉取
//! 清单是新鲜度与完整性判断的事实来源：小文档、独立短 TTL、持久化缓存。
//! 拉取失败返回 None 而非报错——调用方退回硬编码直连 URL（无摘要校验），
//! 清单服务宕机时优先保可用性而不是整体拒绝服务

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::rule::cache::store::RuleStore;
use crate::rule::core::record::now_secs;
use crate::rule::core::RuleCategory;
use crate::rule::loader::http::HttpFetch;

/// 清单持久化键
const MANIFEST_STORE_KEY: &str = "quietweb::manifest";

/// 摘要清单：分类 → {url, sha256, size}
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub last_updated: String,
    pub files: HashMap<String, ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub url: String,
    /// 期望的 SHA-256 摘要（64 位十六进制）
    pub sha256: String,
    pub size: u64,
}

impl Manifest {
    pub fn entry_for(&self, category: RuleCategory) -> Option<&ManifestEntry> {
        self.files.get(category.as_str())
    }
}

/// 持久化缓存包裹（清单本体 + 取数时间）
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedManifest {
    manifest: Manifest,
    fetched_at: u64,
}

/// 清单拉取器
pub struct ManifestFetcher {
    http: Arc<dyn HttpFetch>,
    store: Arc<dyn RuleStore>,
    url: String,
    ttl: Duration,
    timeout: Duration,
}

impl ManifestFetcher {
    pub fn new(
        http: Arc<dyn HttpFetch>,
        store: Arc<dyn RuleStore>,
        url: String,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            store,
            url,
            ttl,
            timeout,
        }
    }

    /// 获取清单；缓存命中且在 TTL 内直接返回，否则重新拉取
    /// 任何失败（网络、JSON、存储）都收敛为 None
    pub async fn get_manifest(&self, force_refresh: bool) -> Option<Manifest> {
        if !force_refresh {
            if let Some(cached) = self.read_cache().await {
                if now_secs().saturating_sub(cached.fetched_at) < self.ttl.as_secs() {
                    return Some(cached.manifest);
                }
            }
        }

        match self.fetch_fresh().await {
            Some(manifest) => Some(manifest),
            None => {
                log::warn!(
                    "Manifest unavailable from {}, callers degrade to direct URLs without digest verification",
                    self.url
                );
                None
            }
        }
    }

    async fn fetch_fresh(&self) -> Option<Manifest> {
        let bytes = match self.http.fetch_bytes(&self.url, self.timeout).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Manifest fetch failed: {}", e);
                return None;
            }
        };

        let manifest: Manifest = match serde_json::from_slice(&bytes) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Manifest JSON parse failed: {}", e);
                return None;
            }
        };

        self.write_cache(&manifest).await;
        log::debug!(
            "Fetched manifest version {} with {} file entries",
            manifest.version,
            manifest.files.len()
        );
        Some(manifest)
    }

    async fn read_cache(&self) -> Option<CachedManifest> {
        let raw = match self.store.get(MANIFEST_STORE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Manifest cache read failed: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(cached) => Some(cached),
            Err(e) => {
                log::warn!("Manifest cache entry corrupt, ignoring: {}", e);
                None
            }
        }
    }

    async fn write_cache(&self, manifest: &Manifest) {
        let cached = CachedManifest {
            manifest: manifest.clone(),
            fetched_at: now_secs(),
        };
        match serde_json::to_string(&cached) {
            Ok(raw) => {
                if let Err(e) = self.store.set(MANIFEST_STORE_KEY, &raw).await {
                    log::warn!("Manifest cache write failed: {}", e);
                }
            }
            Err(e) => log::warn!("Manifest cache serialize failed: {}", e),
        }
    }
}

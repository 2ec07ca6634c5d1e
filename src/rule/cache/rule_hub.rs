//! 规则中枢（缓存协调器）
//! 每分类持有缓存记录（进程内存 + 持久化存储），按来源差异化判定新鲜度，
//! 合并并发取数请求，按严格顺序兜底：
//! 新鲜缓存 → 过期但在退避窗口内的缓存 → 远程拉取 → 旧缓存续用 → 内置兜底。
//! 远程刷新失败时优先续用旧记录而不是立刻换成新鲜的兜底数据——
//! 瞬时网络抖动不应抛弃已验证的好数据（来源反复横跳才是要避免的 bug）

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::config::HubConfig;
use crate::error::{QuietwebError, QwResult};
use crate::rule::cache::store::RuleStore;
use crate::rule::core::record::now_secs;
use crate::rule::core::{RuleCategory, RuleRecord, RuleSetResponse, RuleSource, RuleUpdateEvent};
use crate::rule::loader::fallback::FallbackLoader;
use crate::rule::loader::http::{HttpFetch, ReqwestFetcher};
use crate::rule::loader::manifest::ManifestFetcher;
use crate::rule::loader::remote::RemoteRuleFetcher;

/// 广播通道容量；落后的接收端丢事件不影响发送端
const EVENT_CHANNEL_CAPACITY: usize = 64;

fn record_key(category: RuleCategory) -> String {
    format!("quietweb::rules::{}", category)
}

/// 规则中枢
pub struct RuleHub {
    config: HubConfig,
    store: Arc<dyn RuleStore>,
    fetcher: RemoteRuleFetcher,
    /// 进程内缓存；重启后从持久化存储按需重建
    memory: RwLock<HashMap<RuleCategory, Arc<RuleRecord>>>,
    /// 每分类取数闸门：同一分类同时最多一个在途取数，后来者等待而非重复发起
    gates: Mutex<HashMap<RuleCategory, Arc<Mutex<()>>>>,
    events: broadcast::Sender<RuleUpdateEvent>,
}

impl RuleHub {
    /// 注入取数原语与存储构建中枢（测试入口）
    pub fn new(config: HubConfig, store: Arc<dyn RuleStore>, http: Arc<dyn HttpFetch>) -> Self {
        let manifest = ManifestFetcher::new(
            http.clone(),
            store.clone(),
            config.manifest_url.clone(),
            config.manifest_ttl,
            config.fetch_timeout,
        );
        let fetcher = RemoteRuleFetcher::new(http, manifest, config.clone());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config,
            store,
            fetcher,
            memory: RwLock::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// 使用默认 reqwest 取数原语构建
    pub fn with_defaults(config: HubConfig, store: Arc<dyn RuleStore>) -> QwResult<Self> {
        let http = Arc::new(ReqwestFetcher::new(config.retry.clone())?);
        Ok(Self::new(config, store, http))
    }

    /// 订阅规则变更广播
    pub fn subscribe(&self) -> broadcast::Receiver<RuleUpdateEvent> {
        self.events.subscribe()
    }

    /// 消费方请求接口：获取一个分类的当前规则（深拷贝）
    /// 仅当缓存与内置兜底全部不可用时才返回错误
    pub async fn get_rule_set(
        &self,
        category: RuleCategory,
        force_refresh: bool,
    ) -> QwResult<RuleSetResponse> {
        // 快路径：无需刷新时直接出缓存
        if !force_refresh {
            if let Some(rec) = self.cached_record(category).await {
                if self.serveable_without_refresh(&rec) {
                    return Ok(rec.as_ref().into());
                }
            }
        }

        let gate = self.gate(category).await;
        let _guard = gate.lock().await;

        // 过闸后复查：被合并的前序请求可能已经完成刷新
        if !force_refresh {
            if let Some(rec) = self.cached_record(category).await {
                if self.serveable_without_refresh(&rec) {
                    return Ok(rec.as_ref().into());
                }
            }
        }

        let record = self.refresh_category(category, force_refresh).await?;
        Ok(record.as_ref().into())
    }

    /// 全分类刷新扫描（定时触发或管理端强刷）
    /// 单分类失败只记录日志，不中断其余分类；返回成功分类数
    pub async fn refresh_all(&self, force_refresh: bool) -> usize {
        let mut refreshed = 0;
        for category in RuleCategory::ALL {
            match self.get_rule_set(category, force_refresh).await {
                Ok(_) => refreshed += 1,
                Err(e) => log::error!("[{}] Refresh sweep failed: {}", category, e),
            }
        }
        refreshed
    }

    /// 启动后台周期刷新任务（首轮立即执行，预热长生命周期进程的缓存）
    pub fn spawn_periodic_refresh(
        self: &Arc<Self>,
        period: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let ok = hub.refresh_all(false).await;
                log::debug!("Periodic refresh sweep done ({} categories ok)", ok);
            }
        })
    }

    // ===================== 内部编排 =====================

    /// 执行一次刷新：远程优先，失败后按序兜底；强刷连清单缓存一起穿透
    async fn refresh_category(
        &self,
        category: RuleCategory,
        force_refresh: bool,
    ) -> QwResult<Arc<RuleRecord>> {
        let previous = self.cached_record(category).await;

        match self.fetcher.fetch_remote(category, force_refresh).await {
            Ok(record) => self.commit(category, record, previous.as_deref()).await,
            Err(e) => {
                // 摘要不匹配是安全事件，单独以 error 级别留痕
                match &e {
                    QuietwebError::Integrity { .. } => {
                        log::error!("[{}] {}", category, e);
                    }
                    _ => log::warn!("[{}] Remote refresh failed: {}", category, e),
                }

                if let Some(prev) = previous {
                    // 续用旧记录：整体替换出带失败元信息的新记录，数据不变、不广播
                    let replacement = Arc::new(prev.with_failure(&e.to_string(), now_secs()));
                    self.install(category, replacement.clone()).await;
                    return Ok(replacement);
                }

                log::warn!("[{}] No cached record, loading packaged fallback", category);
                let record = FallbackLoader::load_local(category)?;
                self.commit(category, record, None).await
            }
        }
    }

    /// 落盘新记录；载荷发生结构性变化时广播
    async fn commit(
        &self,
        category: RuleCategory,
        record: RuleRecord,
        previous: Option<&RuleRecord>,
    ) -> QwResult<Arc<RuleRecord>> {
        let changed = previous.map(|p| p.data != record.data).unwrap_or(true);
        let record = Arc::new(record);
        self.install(category, record.clone()).await;

        if changed {
            let event = RuleUpdateEvent {
                category,
                source: record.source,
                fetched_at: record.fetched_at,
            };
            // 发送端不关心接收端状态：无订阅者/落后订阅者都不算失败
            let _ = self.events.send(event);
            log::debug!(
                "[{}] Rules updated from {} ({} primary entries)",
                category,
                record.source,
                record.data.primary_len()
            );
        }

        Ok(record)
    }

    /// 写入内存缓存与持久化存储；存储失败降级为告警，不阻断服务
    async fn install(&self, category: RuleCategory, record: Arc<RuleRecord>) {
        match serde_json::to_string(record.as_ref()) {
            Ok(raw) => {
                if let Err(e) = self.store.set(&record_key(category), &raw).await {
                    log::warn!("[{}] Persisting rule record failed: {}", category, e);
                }
            }
            Err(e) => log::warn!("[{}] Serializing rule record failed: {}", category, e),
        }
        self.memory.write().await.insert(category, record);
    }

    /// 读取缓存记录：内存优先，未命中时从持久化存储懒加载重建
    async fn cached_record(&self, category: RuleCategory) -> Option<Arc<RuleRecord>> {
        if let Some(rec) = self.memory.read().await.get(&category) {
            return Some(rec.clone());
        }

        let raw = match self.store.get(&record_key(category)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("[{}] Cache read failed: {}", category, e);
                return None;
            }
        };

        match serde_json::from_str::<RuleRecord>(&raw) {
            Ok(record) => {
                let record = Arc::new(record);
                self.memory.write().await.insert(category, record.clone());
                Some(record)
            }
            Err(e) => {
                log::warn!("[{}] Cached record corrupt, ignoring: {}", category, e);
                None
            }
        }
    }

    /// 是否可不刷新直接服务：在来源对应的 TTL 内，或仍处于失败退避窗口
    fn serveable_without_refresh(&self, record: &RuleRecord) -> bool {
        let now = now_secs();
        let age = now.saturating_sub(record.fetched_at);
        let fresh = match record.source {
            RuleSource::RemoteVerified => age < self.config.remote_ttl.as_secs(),
            // 兜底是需要尽快逃离的降级态，只休眠一个短重试窗口
            RuleSource::LocalFallback => age < self.config.fallback_retry.as_secs(),
        };
        if fresh {
            return true;
        }

        // 刚刚失败过的分类在退避窗口内续用旧数据，避免高频重试打爆远端
        record
            .last_failure_at
            .map(|at| now.saturating_sub(at) < self.config.fallback_retry.as_secs())
            .unwrap_or(false)
    }

    /// 分类取数闸门（固定五类，闸门常驻不回收）
    async fn gate(&self, category: RuleCategory) -> Arc<Mutex<()>> {
        self.gates
            .lock()
            .await
            .entry(category)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfigBuilder;
    use crate::rule::cache::store::MemoryStore;
    use crate::rule::integrity::sha256_hex;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex as StdMutex;

    const MANIFEST_URL: &str = "https://test.rules/manifest.json";
    const KILL_URL: &str = "https://test.rules/v1/kill_list.json";

    /// 可注入响应并按 URL 计数的取数假实现
    struct FakeHttp {
        responses: StdMutex<StdHashMap<String, Vec<u8>>>,
        calls: StdMutex<StdHashMap<String, usize>>,
        delay: Option<Duration>,
    }

    impl FakeHttp {
        fn new() -> Self {
            Self {
                responses: StdMutex::new(StdHashMap::new()),
                calls: StdMutex::new(StdHashMap::new()),
                delay: None,
            }
        }

        fn with_delay(delay: Duration) -> Self {
            let mut fake = Self::new();
            fake.delay = Some(delay);
            fake
        }

        fn set_response(&self, url: &str, body: Vec<u8>) {
            self.responses.lock().unwrap().insert(url.to_string(), body);
        }

        fn clear_response(&self, url: &str) {
            self.responses.lock().unwrap().remove(url);
        }

        fn call_count(&self, url: &str) -> usize {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl HttpFetch for FakeHttp {
        async fn fetch_bytes(&self, url: &str, _timeout: Duration) -> QwResult<Vec<u8>> {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_insert(0) += 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let body = self.responses.lock().unwrap().get(url).cloned();
            body.ok_or_else(|| QuietwebError::Network {
                url: url.to_string(),
                detail: "connection refused".to_string(),
            })
        }
    }

    fn kill_list_body(selector: &str) -> Vec<u8> {
        serde_json::to_vec(&json!([{"selector": selector}])).unwrap()
    }

    fn manifest_body(kill_list: &[u8]) -> Vec<u8> {
        manifest_body_with_digest(kill_list.len() as u64, &sha256_hex(kill_list))
    }

    fn manifest_body_with_digest(size: u64, digest: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "version": "3",
            "lastUpdated": "2026-08-01T00:00:00Z",
            "files": {
                "killList": { "url": KILL_URL, "sha256": digest, "size": size }
            }
        }))
        .unwrap()
    }

    fn test_config() -> HubConfig {
        // RUST_LOG=debug 可观察编排路径日志
        let _ = env_logger::builder().is_test(true).try_init();
        HubConfigBuilder::new()
            .manifest_url(MANIFEST_URL)
            .rule_base_url("https://test.rules/v1")
            .build()
    }

    fn build_hub(config: HubConfig, http: Arc<FakeHttp>) -> (RuleHub, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (RuleHub::new(config, store.clone(), http), store)
    }

    #[tokio::test]
    async fn test_first_fetch_is_remote_verified_with_single_broadcast() {
        let http = Arc::new(FakeHttp::new());
        let body = kill_list_body(".ad-slot");
        http.set_response(MANIFEST_URL, manifest_body(&body));
        http.set_response(KILL_URL, body);

        let (hub, _) = build_hub(test_config(), http);
        let mut events = hub.subscribe();

        let resp = hub.get_rule_set(RuleCategory::KillList, false).await.unwrap();
        assert_eq!(resp.source, RuleSource::RemoteVerified);
        assert!(resp.verified);
        assert!(resp.last_error.is_none());

        let event = events.try_recv().unwrap();
        assert_eq!(event.category, RuleCategory::KillList);
        assert_eq!(event.source, RuleSource::RemoteVerified);
        // 恰好一次
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_second_request_within_ttl_hits_cache() {
        let http = Arc::new(FakeHttp::new());
        let body = kill_list_body(".ad-slot");
        http.set_response(MANIFEST_URL, manifest_body(&body));
        http.set_response(KILL_URL, body);

        let (hub, _) = build_hub(test_config(), http.clone());
        let first = hub.get_rule_set(RuleCategory::KillList, false).await.unwrap();
        let second = hub.get_rule_set(RuleCategory::KillList, false).await.unwrap();

        assert_eq!(http.call_count(KILL_URL), 1);
        assert_eq!(http.call_count(MANIFEST_URL), 1);
        assert_eq!(first.data, second.data);
        assert_eq!(first.fetched_at, second.fetched_at);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_ttl() {
        let http = Arc::new(FakeHttp::new());
        let body = kill_list_body(".ad-slot");
        http.set_response(MANIFEST_URL, manifest_body(&body));
        http.set_response(KILL_URL, body);

        let (hub, _) = build_hub(test_config(), http.clone());
        hub.get_rule_set(RuleCategory::KillList, false).await.unwrap();
        hub.get_rule_set(RuleCategory::KillList, true).await.unwrap();
        assert_eq!(http.call_count(KILL_URL), 2);
    }

    #[tokio::test]
    async fn test_integrity_mismatch_never_caches_tampered_payload() {
        let http = Arc::new(FakeHttp::new());
        let body = kill_list_body(".tampered");
        // 清单声明的摘要与实际载荷不符
        http.set_response(
            MANIFEST_URL,
            manifest_body_with_digest(body.len() as u64, &"0".repeat(64)),
        );
        http.set_response(KILL_URL, body);

        let (hub, _) = build_hub(test_config(), http);
        let resp = hub.get_rule_set(RuleCategory::KillList, false).await.unwrap();

        // 被篡改的载荷绝不入缓存，改用内置兜底
        assert_eq!(resp.source, RuleSource::LocalFallback);
        let expected = FallbackLoader::load_local(RuleCategory::KillList).unwrap();
        assert_eq!(resp.data, expected.data);
    }

    #[tokio::test]
    async fn test_remote_failure_serves_stale_cache_without_broadcast() {
        let http = Arc::new(FakeHttp::new());
        let body = kill_list_body(".ad-slot");
        http.set_response(MANIFEST_URL, manifest_body(&body));
        http.set_response(KILL_URL, body);

        let (hub, _) = build_hub(test_config(), http.clone());
        let mut events = hub.subscribe();
        let first = hub.get_rule_set(RuleCategory::KillList, false).await.unwrap();
        let _ = events.try_recv().unwrap();

        // 远端失联后强刷：旧的已验证数据续用，而不是换成新鲜兜底
        http.clear_response(KILL_URL);
        let stale = hub.get_rule_set(RuleCategory::KillList, true).await.unwrap();

        assert_eq!(stale.source, RuleSource::RemoteVerified);
        assert_eq!(stale.data, first.data);
        assert!(stale.last_error.is_some());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_identical_payload_refresh_emits_no_broadcast() {
        let http = Arc::new(FakeHttp::new());
        let body = kill_list_body(".ad-slot");
        http.set_response(MANIFEST_URL, manifest_body(&body));
        http.set_response(KILL_URL, body);

        let (hub, _) = build_hub(test_config(), http.clone());
        let mut events = hub.subscribe();
        hub.get_rule_set(RuleCategory::KillList, false).await.unwrap();
        let _ = events.try_recv().unwrap();

        // 内容逐字节相同的成功刷新：有网络调用、无广播
        hub.get_rule_set(RuleCategory::KillList, true).await.unwrap();
        assert_eq!(http.call_count(KILL_URL), 2);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_changed_payload_broadcasts_again() {
        let http = Arc::new(FakeHttp::new());
        let body = kill_list_body(".ad-slot");
        http.set_response(MANIFEST_URL, manifest_body(&body));
        http.set_response(KILL_URL, body);

        let (hub, _) = build_hub(test_config(), http.clone());
        let mut events = hub.subscribe();
        hub.get_rule_set(RuleCategory::KillList, false).await.unwrap();
        let _ = events.try_recv().unwrap();

        let new_body = kill_list_body(".new-ad-slot");
        http.set_response(MANIFEST_URL, manifest_body(&new_body));
        http.set_response(KILL_URL, new_body);
        let resp = hub.get_rule_set(RuleCategory::KillList, true).await.unwrap();

        assert_eq!(resp.data.primary_len(), 1);
        let event = events.try_recv().unwrap();
        assert_eq!(event.category, RuleCategory::KillList);
    }

    #[tokio::test]
    async fn test_force_refresh_busts_manifest_cache() {
        let http = Arc::new(FakeHttp::new());
        let body = kill_list_body(".ad-slot");
        http.set_response(MANIFEST_URL, manifest_body(&body));
        http.set_response(KILL_URL, body);

        let (hub, _) = build_hub(test_config(), http.clone());
        hub.get_rule_set(RuleCategory::KillList, false).await.unwrap();
        assert_eq!(http.call_count(MANIFEST_URL), 1);

        // 上游同时轮换载荷与清单；清单缓存仍在 1 小时 TTL 内
        let new_body = kill_list_body(".new-ad-slot");
        http.set_response(MANIFEST_URL, manifest_body(&new_body));
        http.set_response(KILL_URL, new_body);
        let resp = hub.get_rule_set(RuleCategory::KillList, true).await.unwrap();

        // 强刷必须重拉清单拿到新摘要：新数据通过校验，而不是续用旧数据
        assert_eq!(http.call_count(MANIFEST_URL), 2);
        assert!(resp.verified);
        assert!(resp.last_error.is_none());
        assert_eq!(resp.data.primary_len(), 1);
        assert_eq!(resp.data, hub.get_rule_set(RuleCategory::KillList, false).await.unwrap().data);
        match &resp.data {
            crate::rule::core::RulePayload::KillList(list) => {
                assert_eq!(list.combined[0].selector, ".new-ad-slot");
            }
            other => panic!("unexpected payload variant: {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_requests_coalesce_to_one_fetch() {
        let http = Arc::new(FakeHttp::with_delay(Duration::from_millis(80)));
        let body = kill_list_body(".ad-slot");
        http.set_response(MANIFEST_URL, manifest_body(&body));
        http.set_response(KILL_URL, body);

        let (hub, _) = build_hub(test_config(), http.clone());
        let hub = Arc::new(hub);

        let h1 = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.get_rule_set(RuleCategory::KillList, false).await })
        };
        let h2 = {
            let hub = hub.clone();
            tokio::spawn(async move { hub.get_rule_set(RuleCategory::KillList, false).await })
        };

        let r1 = h1.await.unwrap().unwrap();
        let r2 = h2.await.unwrap().unwrap();
        assert_eq!(r1.data, r2.data);
        // 后来者挂在闸门上等待，不重复发起取数
        assert_eq!(http.call_count(KILL_URL), 1);
    }

    #[tokio::test]
    async fn test_manifest_unreachable_degrades_to_unverified_direct_fetch() {
        let http = Arc::new(FakeHttp::new());
        // 无清单响应；直连 URL 有数据
        http.set_response(KILL_URL, kill_list_body(".ad-slot"));

        let (hub, _) = build_hub(test_config(), http);
        let resp = hub.get_rule_set(RuleCategory::KillList, false).await.unwrap();

        assert_eq!(resp.source, RuleSource::RemoteVerified);
        assert!(!resp.verified);
    }

    #[tokio::test]
    async fn test_everything_unreachable_serves_packaged_fallback() {
        let http = Arc::new(FakeHttp::new());
        let (hub, _) = build_hub(test_config(), http);
        let mut events = hub.subscribe();

        let resp = hub.get_rule_set(RuleCategory::KillList, false).await.unwrap();
        assert_eq!(resp.source, RuleSource::LocalFallback);
        assert!(!resp.verified);
        // 首次产生数据也算变更，广播一次
        assert!(events.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_persisted_record_survives_hub_restart() {
        let http = Arc::new(FakeHttp::new());
        let body = kill_list_body(".ad-slot");
        http.set_response(MANIFEST_URL, manifest_body(&body));
        http.set_response(KILL_URL, body);

        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let hub1 = RuleHub::new(test_config(), store.clone(), http.clone());
        let first = hub1.get_rule_set(RuleCategory::KillList, false).await.unwrap();
        drop(hub1);

        // 重启后的中枢：同一存储、断网的取数端
        let offline = Arc::new(FakeHttp::new());
        let hub2 = RuleHub::new(test_config(), store, offline.clone());
        let restored = hub2.get_rule_set(RuleCategory::KillList, false).await.unwrap();

        assert_eq!(restored.data, first.data);
        assert_eq!(restored.fetched_at, first.fetched_at);
        assert_eq!(offline.call_count(KILL_URL), 0);
    }

    #[tokio::test]
    async fn test_refresh_all_sweeps_every_category() {
        // 全部断网：五类都落到内置兜底，扫描不中断
        let http = Arc::new(FakeHttp::new());
        let (hub, _) = build_hub(test_config(), http);

        let ok = hub.refresh_all(false).await;
        assert_eq!(ok, RuleCategory::ALL.len());
        for category in RuleCategory::ALL {
            let resp = hub.get_rule_set(category, false).await.unwrap();
            assert_eq!(resp.source, RuleSource::LocalFallback);
        }
    }
}

//! 有界超时的 HTTP 取数原语
//! 以 trait 注入到上层取数器，测试用假实现计数/注入故障；
//! 超时、状态码、传输错误三类失败必须可区分，上层据此决定日志与兜底路径

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::RetryPolicy;
use crate::error::{QuietwebError, QwResult};

const USER_AGENT: &str = concat!("QuietWeb/", env!("CARGO_PKG_VERSION"));

/// 取数原语接口
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// 拉取 URL 的完整响应体字节；超出 timeout 即视为失败
    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> QwResult<Vec<u8>>;
}

/// 基于 reqwest 的默认实现
pub struct ReqwestFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl ReqwestFetcher {
    pub fn new(retry: RetryPolicy) -> QwResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| QuietwebError::Network {
                url: String::new(),
                detail: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, retry })
    }

    async fn fetch_once(&self, url: &str, timeout: Duration) -> QwResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header("Accept-Encoding", "gzip, deflate")
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuietwebError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(url, timeout, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn fetch_bytes(&self, url: &str, timeout: Duration) -> QwResult<Vec<u8>> {
        let max_retries = self.retry.max_retries();
        let mut last_err: Option<QuietwebError> = None;

        for attempt in 0..=max_retries {
            match self.fetch_once(url, timeout).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    last_err = Some(e);
                    if attempt < max_retries {
                        log::warn!(
                            "Request failed, retrying (attempt {}/{}): {}",
                            attempt + 1,
                            max_retries,
                            url
                        );
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| QuietwebError::Network {
            url: url.to_string(),
            detail: "all retry attempts exhausted".to_string(),
        }))
    }
}

/// reqwest 错误归类：超时单列，其余归为传输层错误
fn map_reqwest_error(url: &str, timeout: Duration, e: reqwest::Error) -> QuietwebError {
    if e.is_timeout() {
        QuietwebError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        QuietwebError::Network {
            url: url.to_string(),
            detail: e.to_string(),
        }
    }
}

//! 规则取数层
//! http: 有界超时的取数原语；manifest: 摘要清单；remote: 单分类远程取数；
//! fallback: 构建期内置兜底

pub mod fallback;
pub mod http;
pub mod manifest;
pub mod remote;

pub use fallback::FallbackLoader;
pub use http::{HttpFetch, ReqwestFetcher};
pub use manifest::{Manifest, ManifestEntry, ManifestFetcher};
pub use remote::RemoteRuleFetcher;

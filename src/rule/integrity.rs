//! 摘要计算与校验
//! 纯函数、无副作用；校验不匹配返回 false 而非报错，是否致命由调用方决定

use sha2::{Digest, Sha256};

/// 计算字节串的 SHA-256 摘要（小写十六进制）
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// 按期望摘要校验字节串（大小写不敏感）
pub fn verify(bytes: &[u8], expected_hex: &str) -> bool {
    sha256_hex(bytes).eq_ignore_ascii_case(expected_hex.trim())
}

/// 截断摘要用于日志/错误输出（完整 64 位十六进制过长）
/// 清单字段可能被恶意填充非 ASCII 内容，截不动时原样返回
pub fn short_digest(hex: &str) -> &str {
    hex.get(..12).unwrap_or(hex)
}

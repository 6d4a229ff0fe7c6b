use sha2::{Digest, Sha256};

/// 由下载地址生成稳定的标识键（SHA-256 十六进制），用作旁路配置与实体记录的文件名。
///
/// 同一 URL 在任何进程里都得到同一个键，重启后无需注册表即可找到上次的记录。
pub fn identity_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

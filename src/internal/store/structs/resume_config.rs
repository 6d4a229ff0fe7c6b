use serde::{Deserialize, Serialize};

/// 续传旁路配置：与实体同键（URL），记录上次停下的偏移与总大小。
///
/// 只有当本地文件的实际长度等于 `offset` 时才可信，引擎每次都会重新校验。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeConfig {
    pub url: String,
    /// 已写入的字节偏移
    pub offset: u64,
    /// 总大小，未知时为 -1
    pub total_size: i64,
}

impl ResumeConfig {
    pub fn new(url: impl Into<String>, offset: u64, total_size: i64) -> Self {
        Self {
            url: url.into(),
            offset,
            total_size,
        }
    }
}

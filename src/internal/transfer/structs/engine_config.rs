/// 默认写盘块大小：16KB
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// 默认进度转发间隔：10KB
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10 * 1024;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 每次写盘的最大字节数，也是检查停止/取消请求的粒度
    pub chunk_size: usize,
    /// 进度事件对外转发的最小间隔（字节）
    pub progress_interval: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

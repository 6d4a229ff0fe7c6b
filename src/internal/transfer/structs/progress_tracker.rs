//! 字节流包装：统计已接收/已写入字节，以及进度转发节流。

use bytes::Bytes;
use futures_util::StreamExt;

use super::transfer_connection::ByteStream;

/// 包装响应字节流，记录收到的字节数与当前写入偏移。
pub struct ProgressTracker {
    stream: ByteStream,
    offset: u64,
    received: u64,
}

impl ProgressTracker {
    /// `start_offset` 为续传起点，全新下载为 0。
    pub fn new(stream: ByteStream, start_offset: u64) -> Self {
        Self {
            stream,
            offset: start_offset,
            received: 0,
        }
    }

    /// 读取下一块数据；流结束返回 `None`。可安全地在 `select!` 中取消。
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, reqwest::Error>> {
        let next = self.stream.next().await;
        if let Some(Ok(chunk)) = &next {
            self.received += chunk.len() as u64;
        }
        next
    }

    /// 记录已落盘的字节数，返回新的偏移。
    pub fn advance(&mut self, written: u64) -> u64 {
        self.offset += written;
        self.offset
    }

    /// 当前写入偏移（含续传起点）。
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 本次连接收到的字节数。
    pub fn received(&self) -> u64 {
        self.received
    }
}

/// 进度节流：距上次转发超过 `interval` 字节才放行。
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: u64,
    last_emitted: u64,
}

impl ProgressThrottle {
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            last_emitted: 0,
        }
    }

    /// 是否应转发 `offset`；放行时记住该偏移。
    pub fn should_emit(&mut self, offset: u64) -> bool {
        if offset.saturating_sub(self.last_emitted) > self.interval {
            self.last_emitted = offset;
            true
        } else {
            false
        }
    }

    /// 以 `offset` 作为新的基准（开始/续传时调用）。
    pub fn reset(&mut self, offset: u64) {
        self.last_emitted = offset;
    }

    /// 手动记录一次转发。
    pub fn mark(&mut self, offset: u64) {
        self.last_emitted = offset;
    }

    pub fn last_emitted(&self) -> u64 {
        self.last_emitted
    }
}

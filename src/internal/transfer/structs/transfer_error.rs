//! 单次传输的错误类型。
//!
//! 分三类：连接（可由调用方重启重试）、协议（状态码/长度不符）、本地 IO（写盘失败）。

use reqwest::StatusCode;
use thiserror::Error;

/// 错误大类，对应重试策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Connection,
    Protocol,
    Io,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("HTTP 连接失败: {0}")]
    Connection(#[source] reqwest::Error),

    #[error("读取响应失败: {0}")]
    Read(#[source] reqwest::Error),

    #[error("服务器返回异常状态码: {0}")]
    UnexpectedStatus(StatusCode),

    #[error("服务器拒绝续传区间 (416)")]
    RangeNotSatisfiable,

    #[error("服务器返回的区间起点 {actual} 与请求的 {requested} 不一致")]
    RangeMismatch { requested: u64, actual: u64 },

    #[error("连接提前关闭: 已写入 {received} 字节, 预期 {expected} 字节")]
    PrematureEof { received: u64, expected: u64 },

    #[error("响应体超出声明长度 {expected} 字节")]
    BodyOverflow { expected: u64 },

    #[error("打开目标文件失败: {0}")]
    OpenFile(#[source] std::io::Error),

    #[error("写入文件失败: {0}")]
    WriteFile(#[source] std::io::Error),

    #[error("文件定位失败: {0}")]
    SeekFile(#[source] std::io::Error),

    #[error("刷新文件失败: {0}")]
    FlushFile(#[source] std::io::Error),
}

impl TransferError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TransferError::Connection(_) | TransferError::Read(_) => FailureKind::Connection,
            TransferError::UnexpectedStatus(_)
            | TransferError::RangeNotSatisfiable
            | TransferError::RangeMismatch { .. }
            | TransferError::PrematureEof { .. }
            | TransferError::BodyOverflow { .. } => FailureKind::Protocol,
            TransferError::OpenFile(_)
            | TransferError::WriteFile(_)
            | TransferError::SeekFile(_)
            | TransferError::FlushFile(_) => FailureKind::Io,
        }
    }

    /// 调用方重新 `start()` 是否有望成功。
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::UnexpectedStatus(status) => status.is_server_error(),
            _ => self.kind() != FailureKind::Io,
        }
    }
}

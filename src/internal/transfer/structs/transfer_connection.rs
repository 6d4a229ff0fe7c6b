//! 发起（可带 Range 的）GET 请求，解析状态码与长度，交出字节流。

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, Response, StatusCode};

use crate::internal::entity::structs::UNKNOWN_SIZE;

use super::transfer_error::TransferError;

/// 响应体字节流。
pub type ByteStream = BoxStream<'static, Result<Bytes, reqwest::Error>>;

/// 解析后的 `Content-Range: bytes start-end/total`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    /// `*` 表示总长未知
    pub total: Option<u64>,
}

impl ContentRange {
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.trim().strip_prefix("bytes")?.trim_start();
        let (range, total) = rest.split_once('/')?;
        let (start, end) = range.split_once('-')?;
        let total = match total.trim() {
            "*" => None,
            t => Some(t.parse().ok()?),
        };
        Some(Self {
            start: start.trim().parse().ok()?,
            end: end.trim().parse().ok()?,
            total,
        })
    }
}

/// 生成续传请求头：`bytes=<offset>-`。
pub fn range_header(offset: u64) -> String {
    format!("bytes={}-", offset)
}

/// 一次已建立的传输连接。持有响应直到交出字节流，随所有权释放。
#[derive(Debug)]
pub struct TransferConnection {
    response: Response,
    requested_offset: u64,
    content_length: Option<u64>,
    content_range: Option<ContentRange>,
}

impl TransferConnection {
    /// 打开连接；`offset > 0` 时附带 Range 头。
    ///
    /// 416 返回 [`TransferError::RangeNotSatisfiable`]；206 但区间起点不符返回
    /// [`TransferError::RangeMismatch`]；其他非 2xx 返回 [`TransferError::UnexpectedStatus`]。
    pub async fn open(client: &Client, url: &str, offset: u64) -> Result<Self, TransferError> {
        let mut request = client.get(url);
        if offset > 0 {
            request = request.header(RANGE, range_header(offset));
        }
        let response = request.send().await.map_err(TransferError::Connection)?;

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(TransferError::RangeNotSatisfiable);
        }
        if !status.is_success() {
            return Err(TransferError::UnexpectedStatus(status));
        }

        let headers = response.headers();
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let content_range = headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(ContentRange::parse);

        if status == StatusCode::PARTIAL_CONTENT {
            let actual = content_range.map(|r| r.start).unwrap_or(offset);
            if actual != offset {
                return Err(TransferError::RangeMismatch {
                    requested: offset,
                    actual,
                });
            }
        }

        Ok(Self {
            response,
            requested_offset: offset,
            content_length,
            content_range,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// 本次响应体的长度，未声明时为 `None`。
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// 服务器是否按请求的偏移续传（206）。回 200 视为不支持续传。
    pub fn honors_range(&self) -> bool {
        self.requested_offset > 0 && self.status() == StatusCode::PARTIAL_CONTENT
    }

    /// 文件总大小：续传时为已下载偏移 + 本次长度（优先取 Content-Range 的总长），
    /// 全新下载时为本次长度；无从得知时为 -1。
    pub fn total_size(&self) -> i64 {
        if self.honors_range() {
            if let Some(total) = self.content_range.and_then(|r| r.total) {
                return total as i64;
            }
            return self
                .content_length
                .map(|len| (len + self.requested_offset) as i64)
                .unwrap_or(UNKNOWN_SIZE);
        }
        self.content_length
            .map(|len| len as i64)
            .unwrap_or(UNKNOWN_SIZE)
    }

    /// 交出字节流，连接随流一起释放。
    pub fn into_stream(self) -> ByteStream {
        self.response.bytes_stream().boxed()
    }
}

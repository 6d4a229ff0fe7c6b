use super::transfer_error::TransferError;

/// 复制循环的退出原因。
#[derive(Debug)]
pub enum CopyExit {
    /// 连接正常结束
    Eof,
    /// 收到停止或取消请求
    Interrupted,
    Failed(TransferError),
}

/// 一次传输尝试的结局，决定收尾时写/删续传记录与发出的事件。
#[derive(Debug)]
pub enum TransferOutcome {
    /// 已写满声明长度，或长度未知时连接正常结束
    Completed { offset: u64 },
    /// 按请求停止，保留部分文件
    Stopped { offset: u64, total_size: i64 },
    /// 按请求取消
    Cancelled,
    /// 失败；`offset` 为可续传的落盘偏移，无从确认时为 `None`
    Failed {
        error: TransferError,
        offset: Option<u64>,
        total_size: i64,
    },
}

/// [`TransferOutcome::settle`] 的参数（形参超过 3 个，用 struct 承载）。
pub struct SettleParams {
    pub exit: CopyExit,
    /// 关闭文件前 `flush` 的结果
    pub flushed: std::io::Result<()>,
    /// 已交给文件的字节偏移
    pub offset: u64,
    /// 刷新失败时读到的磁盘实际长度
    pub on_disk: Option<u64>,
    pub total_size: i64,
    /// 退出时是否处于取消中
    pub cancelling: bool,
}

impl TransferOutcome {
    /// 由复制循环的退出原因与刷新结果得出结局。
    ///
    /// 刷新失败时写入偏移不可信：续传点改用磁盘上的实际长度（取不到则不提供），
    /// 停止也按失败报告。取消不受刷新结果影响。
    pub fn settle(params: SettleParams) -> Self {
        let SettleParams {
            exit,
            flushed,
            offset,
            on_disk,
            total_size,
            cancelling,
        } = params;

        if matches!(exit, CopyExit::Interrupted) && cancelling {
            return TransferOutcome::Cancelled;
        }

        if let Err(e) = flushed {
            let offset = on_disk.map(|len| len.min(offset));
            let error = match exit {
                CopyExit::Failed(error) => error,
                _ => TransferError::FlushFile(e),
            };
            return TransferOutcome::Failed {
                error,
                offset,
                total_size,
            };
        }

        match exit {
            CopyExit::Interrupted => TransferOutcome::Stopped { offset, total_size },
            CopyExit::Failed(error) => TransferOutcome::Failed {
                error,
                offset: Some(offset),
                total_size,
            },
            CopyExit::Eof if total_size >= 0 && offset != total_size as u64 => {
                TransferOutcome::Failed {
                    error: TransferError::PrematureEof {
                        received: offset,
                        expected: total_size as u64,
                    },
                    offset: Some(offset),
                    total_size,
                }
            }
            CopyExit::Eof => TransferOutcome::Completed { offset },
        }
    }
}

/// 事件动作，对应下载生命周期中的一个节点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadAction {
    /// 连接已建立，总大小已知（或确定未知）
    PreDownload,
    /// 服务器接受区间，从已有偏移继续
    Resume,
    /// 从 0 开始（全新下载或续传被拒）
    Start,
    /// 进度（节流后）
    Running,
    Stop,
    Cancel,
    Complete,
    Fail,
}

impl DownloadAction {
    /// 是否为状态变更类事件（状态通道只接收这些）。
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            DownloadAction::Start
                | DownloadAction::Stop
                | DownloadAction::Cancel
                | DownloadAction::Complete
                | DownloadAction::Fail
        )
    }
}

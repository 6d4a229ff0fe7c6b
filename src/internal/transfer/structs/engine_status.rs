/// 引擎运行状态；停止与取消请求也记录在这里，由同一把锁串行化。
///
/// `Idle → Running → {Stopping, Cancelling} → Idle`，`Stopping` 可升级为 `Cancelling`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Idle,
    Running,
    Stopping,
    Cancelling,
}

impl EngineStatus {
    pub fn is_active(&self) -> bool {
        !matches!(self, EngineStatus::Idle)
    }

    /// 复制循环应在下一个块边界退出。
    pub fn is_interrupting(&self) -> bool {
        matches!(self, EngineStatus::Stopping | EngineStatus::Cancelling)
    }
}

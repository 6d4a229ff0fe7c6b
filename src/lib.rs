/// 内部实现模块
mod internal;

#[cfg(test)]
mod tests;

/// 导出核心入口：任务与构建器
pub use internal::task::structs::{DownloadTask, DownloadTaskBuilder, TaskError};

/// 下载实体与持久化契约，自定义存储实现 [`entity::EntityStore`] 即可
pub mod entity {
    use crate::internal;
    pub use internal::entity::impl_traits::*;
    pub use internal::entity::structs::*;
    pub use internal::entity::traits::*;
}

/// 续传记录（旁路 JSON 文件）
pub mod store {
    use crate::internal;
    pub use internal::store::structs::*;
}

/// 传输层：连接、进度、引擎；一般不需要直接使用
pub mod transfer {
    use crate::internal;
    pub use internal::transfer::structs::*;
}

/// 生命周期事件与监听接口
pub mod events {
    use crate::internal;
    pub use internal::events::structs::{
        ChannelListener, DownloadAction, DownloadEvent, EventDispatcher, StateChangeListener,
    };
    pub use internal::events::traits::*;
}

pub mod states {
    pub mod lock_reactive {
        use crate::internal;
        pub use internal::states::lock_reactive::*;
    }

    pub mod unlock_reactive {
        use crate::internal;
        pub use internal::states::unlock_reactive::*;
    }
}

pub mod utils {
    pub use crate::internal::utils::identity_key;
}

pub mod download_action;
pub mod download_event;
pub mod event_dispatcher;
pub mod listener_adapters;

pub use download_action::DownloadAction;
pub use download_event::DownloadEvent;
pub use event_dispatcher::EventDispatcher;
pub use listener_adapters::{ChannelListener, StateChangeListener};
pub(crate) use listener_adapters::FnListener;

//! 下载任务端到端测试：基于本地回环服务器覆盖全新下载、续传、续传被拒、
//! 停止/继续、失败/继续、取消清理与重复启动。

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::entity::{DownloadEntity, DownloadState, EntityStore, JsonEntityStore, MemoryEntityStore};
use crate::events::{DownloadAction, DownloadEvent};
use crate::store::{ConfigStore, ResumeConfig};
use crate::tests::{
    RangeMode, ServerOptions, TestServer, client, drain, init_logger, payload, recv_until,
};
use crate::transfer::{FailureKind, TransferError};
use crate::{DownloadTask, DownloadTaskBuilder, TaskError};

struct Harness {
    dir: TempDir,
    server: TestServer,
    data: Vec<u8>,
    store: Arc<MemoryEntityStore>,
}

impl Harness {
    async fn new(len: usize, options: ServerOptions) -> Self {
        init_logger();
        let data = payload(len);
        Self {
            dir: tempfile::tempdir().unwrap(),
            server: TestServer::start(data.clone(), options).await,
            data,
            store: Arc::new(MemoryEntityStore::new()),
        }
    }

    fn file(&self) -> PathBuf {
        self.dir.path().join("out").join("file.bin")
    }

    fn configs(&self) -> ConfigStore {
        ConfigStore::new(self.dir.path().join("configs"))
    }

    fn builder(&self, tx: UnboundedSender<DownloadEvent>) -> DownloadTaskBuilder {
        DownloadTask::builder(DownloadEntity::new(&self.server.url, self.file()))
            .client(client())
            .config_store(self.configs())
            .entity_store(self.store.clone())
            .notify_channel(tx)
    }

    async fn task(&self, tx: UnboundedSender<DownloadEvent>) -> DownloadTask {
        self.builder(tx).build().await.unwrap()
    }

    /// 预置部分文件与续传记录。
    async fn preset(&self, file_bytes: usize, offset: u64) {
        tokio::fs::create_dir_all(self.file().parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(self.file(), &self.data[..file_bytes])
            .await
            .unwrap();
        self.configs()
            .save(&ResumeConfig::new(&self.server.url, offset, self.data.len() as i64))
            .await
            .unwrap();
    }

    async fn file_bytes(&self) -> Vec<u8> {
        tokio::fs::read(self.file()).await.unwrap()
    }

    async fn assert_no_artifacts(&self) {
        assert!(!self.file().exists(), "目标文件应已删除");
        assert!(!self.configs().exists(&self.server.url).await, "续传记录应已删除");
        assert_eq!(self.store.read(&self.server.url).await.unwrap(), None);
    }
}

async fn settle(task: &DownloadTask) {
    tokio::time::timeout(Duration::from_secs(10), task.wait_idle())
        .await
        .expect("传输未在限定时间内结束");
}

fn actions(events: &[DownloadEvent]) -> Vec<DownloadAction> {
    events.iter().map(|e| e.action).collect()
}

fn find(events: &[DownloadEvent], action: DownloadAction) -> Option<&DownloadEvent> {
    events.iter().find(|e| e.action == action)
}

fn count(events: &[DownloadEvent], action: DownloadAction) -> usize {
    events.iter().filter(|e| e.action == action).count()
}

// ═══════════════════════════ 全新下载与续传 ═══════════════════════════

#[tokio::test]
async fn fresh_download_completes() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    assert_eq!(events[0].action, DownloadAction::PreDownload);
    assert_eq!(events[0].total_size, 1000);
    assert_eq!(events[1].action, DownloadAction::Start);
    assert_eq!(events[1].offset, Some(0));
    assert_eq!(events.last().unwrap().action, DownloadAction::Complete);
    assert_eq!(find(&events, DownloadAction::Resume).map(|e| e.offset), None);

    assert_eq!(h.file_bytes().await, h.data);
    assert!(!h.configs().exists(&h.server.url).await);

    let entity = task.entity();
    assert_eq!(entity.state, DownloadState::Complete);
    assert!(entity.download_complete);
    assert_eq!(entity.current_progress, 1000);
    assert_eq!(entity.file_size, 1000);
    assert_eq!(h.store.read(&h.server.url).await.unwrap(), Some(entity));
}

#[tokio::test]
async fn resume_from_saved_offset() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    h.preset(400, 400).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    assert_eq!(events[0].total_size, 1000);
    assert_eq!(find(&events, DownloadAction::Resume).unwrap().offset, Some(400));
    assert!(find(&events, DownloadAction::Start).is_none(), "续传不应回退到 0");
    assert!(
        events
            .iter()
            .filter(|e| e.action == DownloadAction::Running)
            .all(|e| e.offset.unwrap() > 400)
    );
    assert_eq!(events.last().unwrap().action, DownloadAction::Complete);

    assert_eq!(h.server.range_headers(), vec![Some("bytes=400-".to_string())]);
    assert_eq!(h.file_bytes().await, h.data);
}

#[tokio::test]
async fn ignored_range_restarts_from_zero() {
    let options = ServerOptions {
        range_mode: RangeMode::Ignore,
        ..Default::default()
    };
    let h = Harness::new(1000, options).await;
    h.preset(400, 400).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    assert_eq!(find(&events, DownloadAction::Start).unwrap().offset, Some(0));
    assert!(find(&events, DownloadAction::Resume).is_none());
    assert_eq!(events.last().unwrap().action, DownloadAction::Complete);
    // 旧的部分文件被截断重写，没有重复数据
    assert_eq!(h.file_bytes().await, h.data);
}

#[tokio::test]
async fn rejected_range_restarts_with_plain_get() {
    let options = ServerOptions {
        range_mode: RangeMode::Reject,
        ..Default::default()
    };
    let h = Harness::new(1000, options).await;
    h.preset(400, 400).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    assert!(find(&events, DownloadAction::Start).is_some());
    assert_eq!(events.last().unwrap().action, DownloadAction::Complete);
    assert_eq!(
        h.server.range_headers(),
        vec![Some("bytes=400-".to_string()), None]
    );
    assert_eq!(h.file_bytes().await, h.data);
}

#[tokio::test]
async fn config_not_matching_file_is_ignored() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    h.preset(300, 400).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    assert!(find(&events, DownloadAction::Start).is_some());
    assert_eq!(h.server.range_headers(), vec![None]);
    assert_eq!(h.file_bytes().await, h.data);
}

#[tokio::test]
async fn restart_with_shorter_body_keeps_progress_within_size() {
    let options = ServerOptions {
        range_mode: RangeMode::Ignore,
        ..Default::default()
    };
    let h = Harness::new(300, options).await;

    // 上次在 1000 字节中的 400 处停下，服务器上的文件已变为 300 字节
    let mut stopped = DownloadEntity::new(&h.server.url, h.file());
    stopped.state = DownloadState::Stopped;
    stopped.current_progress = 400;
    stopped.file_size = 1000;
    h.store.create(&stopped).await.unwrap();
    tokio::fs::create_dir_all(h.file().parent().unwrap())
        .await
        .unwrap();
    tokio::fs::write(h.file(), vec![0u8; 400]).await.unwrap();
    h.configs()
        .save(&ResumeConfig::new(&h.server.url, 400, 1000))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;
    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    for event in &events {
        if event.entity.file_size >= 0 {
            assert!(
                event.entity.current_progress <= event.entity.file_size as u64,
                "{:?}: 进度 {} 超过大小 {}",
                event.action,
                event.entity.current_progress,
                event.entity.file_size
            );
        }
    }
    let pre = find(&events, DownloadAction::PreDownload).unwrap();
    assert_eq!(pre.total_size, 300);
    assert_eq!(pre.entity.current_progress, 0);
    assert_eq!(events.last().unwrap().action, DownloadAction::Complete);
    assert_eq!(h.file_bytes().await, h.data);
}

#[tokio::test]
async fn unknown_length_completes_on_close() {
    let options = ServerOptions {
        send_length: false,
        ..Default::default()
    };
    let h = Harness::new(1000, options).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    assert_eq!(events[0].action, DownloadAction::PreDownload);
    assert_eq!(events[0].total_size, -1);
    let complete = events.last().unwrap();
    assert_eq!(complete.action, DownloadAction::Complete);
    assert_eq!(complete.offset, Some(1000));
    assert_eq!(task.entity().file_size, 1000);
    assert_eq!(h.file_bytes().await, h.data);
}

#[tokio::test]
async fn progress_is_throttled() {
    let h = Harness::new(100_000, ServerOptions::default()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    let running: Vec<u64> = events
        .iter()
        .filter(|e| e.action == DownloadAction::Running)
        .filter_map(|e| e.offset)
        .collect();
    assert!(running.len() as u64 <= 100_000u64.div_ceil(10 * 1024) + 1);
    assert_eq!(running.last(), Some(&100_000));
}

// ═══════════════════════════ 失败与停止 ═══════════════════════════

#[tokio::test]
async fn failure_keeps_resume_point() {
    let options = ServerOptions {
        piece_size: 100,
        piece_delay: Duration::from_millis(2),
        fail_after: Some(500),
        ..Default::default()
    };
    let h = Harness::new(1000, options).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    let fail = events.last().unwrap();
    assert_eq!(fail.action, DownloadAction::Fail);
    assert!(fail.error.is_some());
    assert_eq!(task.entity().state, DownloadState::Failed);

    let saved = h.configs().load(&h.server.url).await.unwrap().unwrap();
    let on_disk = tokio::fs::metadata(h.file()).await.unwrap().len();
    assert_eq!(saved.offset, on_disk);
    assert!(saved.offset > 0);

    // 再次启动从失败处续传
    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    assert_eq!(
        find(&events, DownloadAction::Resume).unwrap().offset,
        Some(saved.offset)
    );
    assert_eq!(events.last().unwrap().action, DownloadAction::Complete);
    assert_eq!(h.file_bytes().await, h.data);
}

#[tokio::test]
async fn connection_failure_reports_cause() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/gone.bin", listener.local_addr().unwrap());
    drop(listener);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = DownloadTask::builder(DownloadEntity::new(&url, dir.path().join("gone.bin")))
        .client(client())
        .config_dir(dir.path().join("configs"))
        .notify_channel(tx)
        .build()
        .await
        .unwrap();

    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    assert_eq!(actions(&events), vec![DownloadAction::Fail]);
    let error = events[0].error.as_ref().unwrap();
    assert_eq!(error.kind(), FailureKind::Connection);
    assert!(matches!(**error, TransferError::Connection(_)));
    assert_eq!(task.entity().state, DownloadState::Failed);
    assert!(!ConfigStore::new(dir.path().join("configs")).exists(&url).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_then_resume() {
    let h = Harness::new(64 * 1024, ServerOptions::slow()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h
        .builder(tx)
        .chunk_size(1024)
        .progress_interval(0)
        .build()
        .await
        .unwrap();

    assert!(task.start());
    recv_until(&mut rx, |e| e.action == DownloadAction::Running).await;
    task.stop().await;

    assert!(!task.is_downloading());
    let entity = task.entity();
    assert_eq!(entity.state, DownloadState::Stopped);
    let offset = entity.current_progress;
    assert!(offset > 0 && offset < 64 * 1024);

    let saved = h.configs().load(&h.server.url).await.unwrap().unwrap();
    assert_eq!(saved.offset, offset);
    assert_eq!(tokio::fs::metadata(h.file()).await.unwrap().len(), offset);

    let events = drain(&mut rx);
    assert_eq!(events.last().unwrap().action, DownloadAction::Stop);
    assert_eq!(events.last().unwrap().offset, Some(offset));

    // 未在下载时 stop 不做任何事
    task.stop().await;
    assert!(drain(&mut rx).is_empty());

    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    assert_eq!(find(&events, DownloadAction::Resume).unwrap().offset, Some(offset));
    assert_eq!(events.last().unwrap().action, DownloadAction::Complete);
    assert_eq!(h.file_bytes().await, h.data);
}

// ═══════════════════════════ 启动约束 ═══════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_start_launches_one_transfer() {
    let h = Harness::new(64 * 1024, ServerOptions::slow()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = Arc::new(h.task(tx).await);
    let launched = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let task = Arc::clone(&task);
        let launched = Arc::clone(&launched);
        handles.push(tokio::spawn(async move {
            if task.start() {
                launched.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(launched.load(Ordering::SeqCst), 1);
    assert!(task.is_downloading());
    assert!(matches!(task.try_start(), Err(TaskError::AlreadyDownloading(_))));

    task.cancel().await;
    let events = drain(&mut rx);
    assert_eq!(count(&events, DownloadAction::PreDownload), 1);
    assert_eq!(h.server.range_headers().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_from_plain_thread() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = Arc::new(h.task(tx).await);

    // 调用方线程不在运行时上下文中
    let handle = Arc::clone(&task);
    let launched = std::thread::spawn(move || handle.start()).join().unwrap();
    assert!(launched);
    settle(&task).await;

    assert_eq!(drain(&mut rx).last().unwrap().action, DownloadAction::Complete);
    assert_eq!(h.file_bytes().await, h.data);
}

#[test]
fn build_outside_runtime_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let builder = DownloadTask::builder(DownloadEntity::new(
        "http://127.0.0.1:1/a.bin",
        dir.path().join("a.bin"),
    ));
    // 只用 futures 执行器驱动，没有 tokio 运行时
    let result = futures_util::FutureExt::now_or_never(builder.build());
    assert!(matches!(result, Some(Err(TaskError::Runtime(_)))));
}

#[tokio::test]
async fn complete_task_refuses_start() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    let (tx, _rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    assert!(task.start());
    settle(&task).await;

    assert!(!task.start());
    assert!(matches!(task.try_start(), Err(TaskError::AlreadyComplete(_))));
    assert_eq!(h.server.range_headers().len(), 1);
}

// ═══════════════════════════ 取消 ═══════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_while_downloading() {
    let h = Harness::new(64 * 1024, ServerOptions::slow()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.builder(tx).chunk_size(1024).progress_interval(0).build().await.unwrap();

    assert!(task.start());
    recv_until(&mut rx, |e| e.action == DownloadAction::Running).await;
    task.cancel().await;

    assert!(!task.is_downloading());
    assert_eq!(task.entity().state, DownloadState::Cancelled);
    let events = drain(&mut rx);
    assert_eq!(count(&events, DownloadAction::Cancel), 1);
    assert_eq!(count(&events, DownloadAction::Complete), 0);
    h.assert_no_artifacts().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cancel_after_stop() {
    let h = Harness::new(64 * 1024, ServerOptions::slow()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.builder(tx).chunk_size(1024).progress_interval(0).build().await.unwrap();

    assert!(task.start());
    recv_until(&mut rx, |e| e.action == DownloadAction::Running).await;
    task.stop().await;
    assert!(h.file().exists());

    task.cancel().await;
    let events = drain(&mut rx);
    assert_eq!(count(&events, DownloadAction::Cancel), 1);
    h.assert_no_artifacts().await;
}

#[tokio::test]
async fn cancel_after_failure() {
    let options = ServerOptions {
        fail_after: Some(200),
        fail_requests: usize::MAX,
        ..Default::default()
    };
    let h = Harness::new(1000, options).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    assert!(task.start());
    settle(&task).await;
    assert_eq!(task.entity().state, DownloadState::Failed);

    task.cancel().await;
    let events = drain(&mut rx);
    assert_eq!(count(&events, DownloadAction::Cancel), 1);
    h.assert_no_artifacts().await;
}

#[tokio::test]
async fn cancel_after_complete() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    assert!(task.start());
    settle(&task).await;
    assert!(h.file().exists());

    task.cancel().await;
    task.cancel().await;
    let events = drain(&mut rx);
    assert_eq!(count(&events, DownloadAction::Cancel), 1);
    h.assert_no_artifacts().await;
}

#[tokio::test]
async fn cancel_before_start() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;
    assert!(h.store.read(&h.server.url).await.unwrap().is_some());

    task.cancel().await;
    assert_eq!(actions(&drain(&mut rx)), vec![DownloadAction::Cancel]);
    h.assert_no_artifacts().await;
    assert!(h.server.range_headers().is_empty());
}

#[tokio::test]
async fn cancelled_task_can_restart() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;

    task.cancel().await;
    assert!(task.start());
    settle(&task).await;

    let events = drain(&mut rx);
    assert_eq!(events.last().unwrap().action, DownloadAction::Complete);
    assert_eq!(h.file_bytes().await, h.data);
}

// ═══════════════════════════ 构建器与观察 ═══════════════════════════

#[tokio::test]
async fn state_channel_receives_only_state_changes() {
    let h = Harness::new(50_000, ServerOptions::default()).await;
    let (tx, _rx) = mpsc::unbounded_channel();
    let (state_tx, mut state_rx) = mpsc::unbounded_channel();
    let task = h.builder(tx).state_channel(state_tx).build().await.unwrap();

    assert!(task.start());
    settle(&task).await;

    assert_eq!(
        actions(&drain(&mut state_rx)),
        vec![DownloadAction::Start, DownloadAction::Complete]
    );
}

#[tokio::test]
async fn on_event_closure_sees_every_event() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let task = h
        .builder(tx)
        .on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .await
        .unwrap();

    assert!(task.start());
    settle(&task).await;
    assert_eq!(seen.load(Ordering::SeqCst), drain(&mut rx).len());
}

#[tokio::test]
async fn watch_entity_observes_completion() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    let (tx, _rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;
    let mut watcher = task.watch_entity();

    assert!(task.start());
    let done = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let entity = watcher.changed().await.unwrap();
            if entity.state == DownloadState::Complete {
                return entity;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(done.current_progress, 1000);
}

#[tokio::test]
async fn build_validates_url() {
    let dir = tempfile::tempdir().unwrap();
    let invalid = DownloadTask::builder(DownloadEntity::new("not a url", dir.path().join("a")))
        .build()
        .await;
    assert!(matches!(invalid, Err(TaskError::InvalidUrl(_))));

    let ftp = DownloadTask::builder(DownloadEntity::new("ftp://host/a", dir.path().join("a")))
        .build()
        .await;
    assert!(matches!(ftp, Err(TaskError::UnsupportedScheme(_))));
}

#[tokio::test]
async fn build_loads_existing_record() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    let mut stale = DownloadEntity::new(&h.server.url, h.file());
    stale.state = DownloadState::Downloading;
    stale.current_progress = 123;
    h.store.create(&stale).await.unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let task = h.task(tx).await;
    let entity = task.entity();
    // 上次进程中途退出留下的 Downloading 按 Stopped 处理
    assert_eq!(entity.state, DownloadState::Stopped);
    assert_eq!(entity.current_progress, 123);
    assert!(!task.is_downloading());
}

#[tokio::test]
async fn json_store_survives_restart() {
    let h = Harness::new(1000, ServerOptions::default()).await;
    let store: Arc<dyn EntityStore> = Arc::new(JsonEntityStore::new(h.dir.path().join("entities")));
    let (tx, _rx) = mpsc::unbounded_channel();
    let task = h.builder(tx.clone()).entity_store(store.clone()).build().await.unwrap();

    assert!(task.start());
    settle(&task).await;
    drop(task);

    let reopened = h.builder(tx).entity_store(store).build().await.unwrap();
    assert_eq!(reopened.entity().state, DownloadState::Complete);
    assert!(!reopened.start());
}

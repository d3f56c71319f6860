//! 轮询引擎 - 提取 → 分类 → 去重 → 投递 → 标记
//!
//! 单线程循环：一轮完整跑完再休眠，停止信号只在轮与轮之间检查。
//! 投递失败的消息不标记，下一轮只要快照里还在就会重试。

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::dedup::DedupStore;
use crate::message::{extract, MessageClassifier, MessageIdentity, StructuredMessage};
use crate::notification::Dispatch;
use crate::source::ContentSource;

/// 休眠时检查停止信号的粒度
const STOP_POLL_SLICE: Duration = Duration::from_millis(100);

/// 引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Scanning,
    Dispatching,
    Stopped,
}

/// 引擎事件（供观察者记录，不影响去重状态）
#[derive(Debug, Clone)]
pub enum PollEvent<'a> {
    CycleStarted { cycle: u64 },
    /// 来源报告没有变化，跳过提取
    NoNewContent { cycle: u64 },
    /// 来源不可达或读取失败
    SourceUnavailable { cycle: u64 },
    FragmentsFound { cycle: u64, count: usize },
    NewMessage {
        message: &'a StructuredMessage,
        identity: &'a MessageIdentity,
    },
    DispatchResult {
        identity: &'a MessageIdentity,
        success: bool,
    },
    PersistFailed {
        identity: &'a MessageIdentity,
        error: String,
    },
    CycleFinished { report: &'a CycleReport },
    Stopped { cycles: u64 },
}

/// 引擎事件观察者
pub trait PollObserver {
    fn on_event(&mut self, event: &PollEvent<'_>);
}

/// 默认观察者：写 tracing 日志
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PollObserver for TracingObserver {
    fn on_event(&mut self, event: &PollEvent<'_>) {
        match event {
            PollEvent::CycleStarted { cycle } => debug!(cycle, "Poll cycle started"),
            PollEvent::NoNewContent { cycle } => debug!(cycle, "No new content"),
            PollEvent::SourceUnavailable { cycle } => debug!(cycle, "Source unavailable, cycle skipped"),
            PollEvent::FragmentsFound { cycle, count } => {
                debug!(cycle, count, "Found pushcontent fragments")
            }
            PollEvent::NewMessage { message, identity } => {
                let kind = if message.is_group { "群聊" } else { "私聊" };
                let preview: String = message.content.chars().take(50).collect();
                info!(
                    kind,
                    sender = %message.sender,
                    id = %identity.short(),
                    "[NEW] {}",
                    preview
                );
            }
            PollEvent::DispatchResult { identity, success } => {
                if *success {
                    info!(id = %identity.short(), "Message dispatched");
                } else {
                    warn!(id = %identity.short(), "Dispatch failed, left unmarked for retry");
                }
            }
            PollEvent::PersistFailed { identity, error } => {
                error!(id = %identity.short(), error = %error, "Dispatched but dedup state not persisted");
            }
            PollEvent::CycleFinished { report } => {
                if report.dispatched > 0 || report.failed > 0 {
                    info!(
                        cycle = report.cycle,
                        dispatched = report.dispatched,
                        failed = report.failed,
                        "Poll cycle finished"
                    );
                }
            }
            PollEvent::Stopped { cycles } => info!(cycles, "Poll engine stopped"),
        }
    }
}

/// 单轮结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    /// 是否实际读取并解析了快照
    pub scanned: bool,
    pub fragments: usize,
    /// 去重后的新消息数
    pub new_messages: usize,
    /// 投递成功数
    pub dispatched: usize,
    /// 投递失败数
    pub failed: usize,
}

/// 停止信号（可跨线程克隆）
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 轮询引擎
pub struct PollEngine<S, D> {
    source: S,
    dispatcher: D,
    store: DedupStore,
    classifier: MessageClassifier,
    observer: Box<dyn PollObserver + Send>,
    interval: Duration,
    state: EngineState,
    cycles: u64,
    /// 上一轮读取或投递失败，下一轮即使来源没变也要重读
    retry_pending: bool,
}

impl<S: ContentSource, D: Dispatch> PollEngine<S, D> {
    pub fn new(source: S, dispatcher: D, store: DedupStore, interval: Duration) -> Self {
        Self {
            source,
            dispatcher,
            store,
            classifier: MessageClassifier::default(),
            observer: Box::new(TracingObserver),
            interval,
            state: EngineState::Idle,
            cycles: 0,
            retry_pending: false,
        }
    }

    pub fn with_classifier(mut self, classifier: MessageClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn PollObserver + Send>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    /// 执行一轮轮询
    pub fn poll_once(&mut self) -> CycleReport {
        self.cycles += 1;
        let cycle = self.cycles;
        let mut report = CycleReport {
            cycle,
            ..Default::default()
        };

        self.state = EngineState::Scanning;
        self.observer.on_event(&PollEvent::CycleStarted { cycle });

        if !self.source.has_new_content() && !self.retry_pending {
            self.observer.on_event(&PollEvent::NoNewContent { cycle });
            return self.finish_cycle(report);
        }

        let Some(text) = self.source.read_text() else {
            // 变化已被来源记下，不重读就会一直错过这次变化
            self.retry_pending = true;
            self.observer.on_event(&PollEvent::SourceUnavailable { cycle });
            return self.finish_cycle(report);
        };
        report.scanned = true;

        let messages: Vec<StructuredMessage> = extract(&text)
            .map(|fragment| self.classifier.classify(&fragment))
            .collect();
        report.fragments = messages.len();
        if !messages.is_empty() {
            self.observer.on_event(&PollEvent::FragmentsFound {
                cycle,
                count: messages.len(),
            });
        }

        for message in &messages {
            let identity = MessageIdentity::of(message);
            if self.store.is_known(&identity) {
                continue;
            }

            report.new_messages += 1;
            self.state = EngineState::Dispatching;
            self.observer.on_event(&PollEvent::NewMessage {
                message,
                identity: &identity,
            });

            let success = self.dispatcher.send(
                &message.conversation_label,
                &message.sender,
                &message.content,
            );
            self.observer.on_event(&PollEvent::DispatchResult {
                identity: &identity,
                success,
            });

            if !success {
                report.failed += 1;
                continue;
            }

            report.dispatched += 1;
            if let Err(e) = self.store.mark_known(identity.clone()) {
                self.observer.on_event(&PollEvent::PersistFailed {
                    identity: &identity,
                    error: e.to_string(),
                });
            }
        }

        self.retry_pending = report.failed > 0;
        self.finish_cycle(report)
    }

    fn finish_cycle(&mut self, report: CycleReport) -> CycleReport {
        self.state = EngineState::Idle;
        self.observer.on_event(&PollEvent::CycleFinished { report: &report });
        report
    }

    /// 持续轮询直到收到停止信号，返回累计投递数
    pub fn run(&mut self, stop: &StopHandle) -> usize {
        info!(
            source = %self.source.name(),
            interval_ms = self.interval.as_millis() as u64,
            known = self.store.len(),
            "Poll engine started"
        );

        let mut total = 0;
        while !stop.is_stopped() {
            total += self.poll_once().dispatched;
            self.sleep_interval(stop);
        }

        self.state = EngineState::Stopped;
        self.observer.on_event(&PollEvent::Stopped { cycles: self.cycles });
        total
    }

    /// 分片休眠，期间收到停止信号立即返回
    fn sleep_interval(&self, stop: &StopHandle) {
        let mut remaining = self.interval;
        while !remaining.is_zero() && !stop.is_stopped() {
            let slice = remaining.min(STOP_POLL_SLICE);
            std::thread::sleep(slice);
            remaining = remaining.saturating_sub(slice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct StaticSource {
        text: Option<String>,
        changed: bool,
        reads: usize,
    }

    impl StaticSource {
        fn new(text: &str) -> Self {
            Self {
                text: Some(text.to_string()),
                changed: true,
                reads: 0,
            }
        }
    }

    impl ContentSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        fn has_new_content(&mut self) -> bool {
            std::mem::replace(&mut self.changed, false)
        }

        fn read_text(&mut self) -> Option<String> {
            self.reads += 1;
            self.text.clone()
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        sent: RefCell<Vec<String>>,
        fail: RefCell<bool>,
    }

    impl Dispatch for RecordingDispatcher {
        fn send(&self, conversation_label: &str, sender: &str, content: &str) -> bool {
            self.sent
                .borrow_mut()
                .push(format!("{}|{}|{}", conversation_label, sender, content));
            !*self.fail.borrow()
        }
    }

    #[derive(Clone, Default)]
    struct CollectingObserver(Arc<Mutex<Vec<String>>>);

    impl PollObserver for CollectingObserver {
        fn on_event(&mut self, event: &PollEvent<'_>) {
            let name = match event {
                PollEvent::CycleStarted { .. } => "start",
                PollEvent::NoNewContent { .. } => "unchanged",
                PollEvent::SourceUnavailable { .. } => "unavailable",
                PollEvent::FragmentsFound { .. } => "fragments",
                PollEvent::NewMessage { .. } => "new",
                PollEvent::DispatchResult { success: true, .. } => "sent",
                PollEvent::DispatchResult { success: false, .. } => "failed",
                PollEvent::PersistFailed { .. } => "persist_failed",
                PollEvent::CycleFinished { .. } => "finish",
                PollEvent::Stopped { .. } => "stopped",
            };
            self.0.lock().unwrap().push(name.to_string());
        }
    }

    const DUMP: &str = concat!(
        "<pushcontent content=\" Alice : hi\" nickname=\"群聊\" />",
        "\u{1}\u{2}",
        "<pushcontent content=\"hello\" nickname=\"Bob\" />",
    );

    fn engine(
        text: &str,
        dir: &std::path::Path,
    ) -> PollEngine<StaticSource, RecordingDispatcher> {
        PollEngine::new(
            StaticSource::new(text),
            RecordingDispatcher::default(),
            DedupStore::in_dir(dir),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn test_poll_once_dispatches_new_messages() {
        let dir = tempdir().unwrap();
        let mut engine = engine(DUMP, dir.path());

        let report = engine.poll_once();
        assert!(report.scanned);
        assert_eq!(report.fragments, 2);
        assert_eq!(report.dispatched, 2);
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(
            *engine.dispatcher().sent.borrow(),
            vec!["group_with_AI|Alice|hi".to_string(), "Mwu！|Bob|hello".to_string()]
        );
        assert_eq!(engine.store().len(), 2);
    }

    #[test]
    fn test_unchanged_source_skips_extraction() {
        let dir = tempdir().unwrap();
        let mut engine = engine(DUMP, dir.path());
        engine.poll_once();

        let report = engine.poll_once();
        assert!(!report.scanned);
        assert_eq!(engine.source().reads, 1);
    }

    #[test]
    fn test_repeated_scans_dispatch_once() {
        let dir = tempdir().unwrap();
        let mut engine = engine(DUMP, dir.path());
        engine.poll_once();

        engine.source_mut().changed = true;
        let report = engine.poll_once();
        assert!(report.scanned);
        assert_eq!(report.new_messages, 0);
        assert_eq!(engine.dispatcher().sent.borrow().len(), 2);
    }

    #[test]
    fn test_failed_dispatch_retried_even_without_change() {
        let dir = tempdir().unwrap();
        let mut engine = engine(DUMP, dir.path());
        *engine.dispatcher().fail.borrow_mut() = true;

        let report = engine.poll_once();
        assert_eq!(report.failed, 2);
        assert!(engine.store().is_empty());

        *engine.dispatcher().fail.borrow_mut() = false;
        // 来源未变化，但有待重试的消息
        let report = engine.poll_once();
        assert!(report.scanned);
        assert_eq!(report.dispatched, 2);
        assert_eq!(engine.dispatcher().sent.borrow().len(), 4);

        let report = engine.poll_once();
        assert!(!report.scanned);
    }

    #[test]
    fn test_source_unavailable_is_noop() {
        let dir = tempdir().unwrap();
        let mut engine = engine(DUMP, dir.path());
        engine.source_mut().text = None;

        let report = engine.poll_once();
        assert!(!report.scanned);
        assert_eq!(report.dispatched, 0);
        assert!(engine.dispatcher().sent.borrow().is_empty());
    }

    #[test]
    fn test_read_failure_after_change_is_retried() {
        let dir = tempdir().unwrap();
        let mut engine = engine("<pushcontent content=\"a\" nickname=\"Bob\" />", dir.path());
        assert_eq!(engine.poll_once().dispatched, 1);

        // 检测到变化，但这一轮读取失败
        engine.source_mut().changed = true;
        engine.source_mut().text = None;
        let report = engine.poll_once();
        assert!(!report.scanned);

        // 来源不再报告变化，读取已恢复
        let grown = concat!(
            "<pushcontent content=\"a\" nickname=\"Bob\" />",
            "<pushcontent content=\"NEW\" nickname=\"Bob\" />",
        );
        engine.source_mut().text = Some(grown.to_string());
        let report = engine.poll_once();
        assert!(report.scanned);
        assert_eq!(report.dispatched, 1);
        assert_eq!(
            *engine.dispatcher().sent.borrow(),
            vec!["Mwu！|Bob|a".to_string(), "Mwu！|Bob|NEW".to_string()]
        );

        assert!(!engine.poll_once().scanned);
    }

    #[test]
    fn test_first_read_failure_does_not_hide_existing_dump() {
        let dir = tempdir().unwrap();
        let mut engine = engine(DUMP, dir.path());
        let text = engine.source_mut().text.take();

        assert!(!engine.poll_once().scanned);
        engine.source_mut().text = text;
        assert_eq!(engine.poll_once().dispatched, 2);
    }

    #[test]
    fn test_observer_event_order() {
        let dir = tempdir().unwrap();
        let observer = CollectingObserver::default();
        let events = observer.0.clone();
        let mut engine = engine("<pushcontent content=\"hello\" nickname=\"Bob\" />", dir.path())
            .with_observer(Box::new(observer));

        engine.poll_once();
        engine.poll_once();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["start", "fragments", "new", "sent", "finish", "start", "unchanged", "finish"]
        );
    }

    #[test]
    fn test_run_stops_at_cycle_boundary() {
        let dir = tempdir().unwrap();
        let mut engine = engine(DUMP, dir.path());
        let stop = StopHandle::new();
        stop.stop();

        assert_eq!(engine.run(&stop), 0);
        assert_eq!(engine.cycles(), 0);
        assert_eq!(engine.state(), EngineState::Stopped);
    }

    #[test]
    fn test_run_until_stopped_from_other_thread() {
        let dir = tempdir().unwrap();
        let stop = StopHandle::new();
        let remote = stop.clone();
        let path = dir.path().to_path_buf();

        let handle = std::thread::spawn(move || {
            let mut engine = PollEngine::new(
                StaticSource::new(DUMP),
                CountingDispatcher,
                DedupStore::in_dir(&path),
                Duration::from_millis(5),
            );
            let total = engine.run(&remote);
            (total, engine.cycles())
        });

        std::thread::sleep(Duration::from_millis(60));
        stop.stop();
        let (total, cycles) = handle.join().unwrap();
        assert_eq!(total, 2);
        assert!(cycles >= 1);
    }

    struct CountingDispatcher;

    impl Dispatch for CountingDispatcher {
        fn send(&self, _: &str, _: &str, _: &str) -> bool {
            true
        }
    }
}

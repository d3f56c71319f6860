//! WeChat Connector - 把模拟器里的微信推送转发到 OpenClaw，每条消息只投递一次

pub mod cli;
pub mod config;
pub mod daemon;
pub mod dedup;
pub mod engine;
pub mod message;
pub mod notification;
pub mod sender;
pub mod source;

pub use config::ConnectorConfig;
pub use daemon::{InstanceGuard, PollerDaemon};
pub use dedup::{DedupState, DedupStats, DedupStore};
pub use engine::{CycleReport, EngineState, PollEngine, PollEvent, PollObserver, StopHandle, TracingObserver};
pub use message::{ConversationLabels, MessageClassifier, MessageIdentity, RawFragment, StructuredMessage};
pub use notification::{Dispatch, WebhookConfig, WebhookDispatcher};
pub use sender::{AppleScriptSender, MessageSender};
pub use source::{AdbReader, ChangeTracker, ContentSource, DeviceConfig, FileSource, FileStat};

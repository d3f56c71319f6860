//! 通知投递 - 把结构化消息推送到外部 hook

pub mod webhook;

pub use webhook::{format_wake_text, Dispatch, WakePayload, WebhookConfig, WebhookDispatcher};

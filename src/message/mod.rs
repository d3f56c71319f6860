//! 消息解析 - 提取、分类与身份计算

pub mod classifier;
pub mod extractor;
pub mod identity;

pub use classifier::{ConversationLabels, MessageClassifier, StructuredMessage, SENDER_SEPARATOR};
pub use extractor::{extract, extract_all, RawFragment};
pub use identity::{canonical_key, MessageIdentity};

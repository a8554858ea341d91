//! Durable corpus storage: per-topic JSONL files with CSV mirrors, append-only
//! session logs, and the merge engine that folds a session into the corpus.

pub mod error;
pub mod export;
pub mod merge;
pub mod session_log;
pub mod store;

pub use error::CorpusError;
pub use merge::{merge_session, MergeReport};
pub use session_log::SessionLog;
pub use store::CorpusStore;

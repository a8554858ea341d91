pub mod backoff;
pub mod client;
pub mod collector;
pub mod error;
pub mod features;
pub mod filter;
pub mod profile;
pub mod search;
pub mod stream;
pub mod types;

pub use client::BskyClient;
pub use collector::{Collector, FlushPolicy, PostSink, RunStats, SinkError};
pub use error::CollectError;
pub use features::FeatureExtractor;
pub use filter::KeywordFilter;
pub use profile::{ProfileCache, ProfileSource};
pub use search::{CrawlOptions, CrawlWindow, SearchCrawler, SearchSource};
pub use stream::{
    ConsumerState, PollingTransport, RepoEvent, RepoOp, StreamConsumer, SubscriptionTransport,
};

use std::path::PathBuf;

/// Runtime configuration for a collector process, loaded from the
/// environment by [`crate::config::load_app_config`].
#[derive(Clone)]
pub struct AppConfig {
    /// Bluesky account identifier (handle or email) used to authenticate.
    pub identifier: String,
    /// App password for the account. Never logged.
    pub app_password: String,
    /// Base URL of the XRPC service, e.g. `https://bsky.social`.
    pub service_url: String,
    /// Root directory for the corpus and session logs.
    pub data_dir: PathBuf,
    /// Optional YAML file overriding the built-in topic catalog.
    pub topics_path: Option<PathBuf>,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    /// Delay between search pages for the same query.
    pub inter_page_delay_ms: u64,
    /// Delay between queries within a topic.
    pub inter_query_delay_ms: u64,
    /// Flush the session buffer once it holds this many posts.
    pub flush_max_buffered: usize,
    /// Flush the session buffer after this many seconds regardless of size.
    pub flush_max_interval_secs: u64,
    /// Poll interval for the fallback subscription transport.
    pub stream_poll_interval_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("identifier", &self.identifier)
            .field("app_password", &"[redacted]")
            .field("service_url", &self.service_url)
            .field("data_dir", &self.data_dir)
            .field("topics_path", &self.topics_path)
            .field("log_level", &self.log_level)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("inter_page_delay_ms", &self.inter_page_delay_ms)
            .field("inter_query_delay_ms", &self.inter_query_delay_ms)
            .field("flush_max_buffered", &self.flush_max_buffered)
            .field("flush_max_interval_secs", &self.flush_max_interval_secs)
            .field(
                "stream_poll_interval_secs",
                &self.stream_poll_interval_secs,
            )
            .finish()
    }
}

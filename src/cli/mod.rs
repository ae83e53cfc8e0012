use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- API Args ---
    /// Base URL of the VideoIndex API.
    #[arg(long, env = "API_BASE_URL", default_value = "https://api.videoindex.app")]
    pub api_base_url: String,

    /// Path of the persisted session token file.
    #[arg(long, env = "SESSION_TOKEN_PATH", default_value = ".videoindex/session_token.json")]
    pub session_token_path: String,

    /// Timeout for plain request/response calls, in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    pub request_timeout_secs: u64,

    /// Per-read timeout while consuming a streamed answer, in seconds. Expiry
    /// fails that stream only, never the session.
    #[arg(long, env = "STREAM_READ_TIMEOUT_SECS", default_value = "60")]
    pub stream_read_timeout_secs: u64,

    // --- Query Args ---
    /// Maximum number of indexed passages the backend may consult per query.
    #[arg(long, env = "QUERY_MAX_RESULTS", default_value = "5")]
    pub query_max_results: u32,

    // --- Player Args ---
    /// Settle delay after the player reports ready before a deferred seek is
    /// applied, in milliseconds.
    #[arg(long, env = "SEEK_SETTLE_MS", default_value = "150")]
    pub seek_settle_ms: u64,

    // --- Mode selection ---
    /// Open the chat view for one pod. Without this (or the flags below) the
    /// pod list is printed.
    #[arg(long, env = "POD_ID")]
    pub pod_id: Option<i64>,

    /// Create a new pod with this title; requires at least one --video-url.
    #[arg(long)]
    pub create_title: Option<String>,

    /// Source video URL for pod creation. Repeat for multiple videos.
    #[arg(long)]
    pub video_url: Vec<String>,

    /// Print per-pod usage counts and exit.
    #[arg(long, default_value = "false")]
    pub usage: bool,
}

use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[arg(long, env = "RERANK_LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen_addr: String,

    /// Model name passed to `<ollama-bin> run`.
    #[arg(long, env = "RERANK_MODEL", default_value = "gemma3:4b")]
    pub model: String,

    #[arg(long, env = "RERANK_OLLAMA_BIN", default_value = "ollama")]
    pub ollama_bin: String,

    /// Hard wall-clock limit for one model invocation.
    #[arg(long, env = "RERANK_INVOKE_TIMEOUT_SECS", default_value_t = 15)]
    pub invoke_timeout_secs: u64,

    /// Model processes allowed to run at the same time.
    #[arg(long, env = "RERANK_MAX_CONCURRENT", default_value_t = 4)]
    pub max_concurrent: usize,

    /// Requests allowed to wait for a free slot before new ones are rejected.
    #[arg(long, env = "RERANK_MAX_QUEUED", default_value_t = 16)]
    pub max_queued: usize,

    /// "passthrough" returns the model's list unchecked;
    /// "strict" rejects indices that are not candidates or repeat.
    #[arg(long, env = "RERANK_INDEX_POLICY", default_value = "passthrough")]
    pub index_policy: String,

    /// JSON prompt profile replacing the built-in v1 wording and abbreviations.
    #[arg(long, env = "RERANK_PROMPT_PROFILE")]
    pub prompt_profile: Option<String>,

    /// Directory served for every non-API path.
    #[arg(long, env = "RERANK_STATIC_DIR")]
    pub static_dir: Option<String>,

    /// "text" or "json".
    #[arg(long, env = "RERANK_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// OTLP endpoint for exporting traces.
    #[arg(long, env = "RERANK_OTLP_URL")]
    pub otlp_url: Option<String>,

    /// Bearer token for the OTLP endpoint.
    #[arg(long, env = "RERANK_OTLP_TOKEN")]
    pub otlp_token: Option<String>,
}

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "rerank")]
#[command(about = "Client for the plan rerank proxy", long_about = None)]
pub struct Args {
    /// Proxy base URL
    #[arg(long, env = "RERANK_PROXY_URL", default_value = "http://127.0.0.1:8000")]
    pub proxy_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render the model prompt for a request file without calling anything
    Prompt {
        /// Request JSON file ("-" for stdin)
        file: String,

        /// Prompt profile JSON (default: built-in v1)
        #[arg(long)]
        profile: Option<String>,
    },
    /// Send a request file to the proxy and print the ranking
    Send {
        /// Request JSON file ("-" for stdin)
        file: String,
    },
}

mod args;
mod output;

use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;

use rerank_common::RerankRequest;
use rerank_core::profile::PromptProfile;
use rerank_core::prompt;

use crate::args::{Args, Command};
use crate::output::print_ranking;

const OUTCOME_HEADER: &str = "x-rerank-outcome";

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read request from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("failed to read {file}"))
    }
}

fn parse_request(raw: &str) -> Result<RerankRequest> {
    serde_json::from_str(raw).context("request is not a valid rerank request")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Prompt { file, profile } => {
            let req = parse_request(&read_input(&file)?)?;
            let profile = match profile {
                Some(path) => PromptProfile::load(&path)?,
                None => PromptProfile::v1(),
            };
            println!("{}", prompt::encode(&profile, &req.ctx, &req.candidates));
        }
        Command::Send { file } => {
            let raw = read_input(&file)?;
            let req = parse_request(&raw)?;
            let body: serde_json::Value = serde_json::from_str(&raw)?;

            let url = format!("{}/api/rerank", args.proxy_url.trim_end_matches('/'));
            let resp = Client::new().post(&url).json(&body).send().await?;
            let status = resp.status();
            if !status.is_success() {
                eprintln!("✗ Rerank failed: {} {}", status, resp.text().await?);
                std::process::exit(1);
            }
            let outcome = resp
                .headers()
                .get(OUTCOME_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            let ranking: Vec<i64> = resp.json().await?;
            print_ranking(&req, &outcome, &ranking);
        }
    }
    Ok(())
}

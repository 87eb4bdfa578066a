//! The `proctor check` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use proctor_client::load_config_from;
use proctor_core::traits::AssessmentApi;

pub async fn execute(config_path: Option<PathBuf>, api_base: Option<String>) -> Result<()> {
    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(base) = api_base {
        config.api_base = base;
    }
    let api = config.create_api()?;

    let remote = api
        .config()
        .await
        .with_context(|| format!("failed to reach {}", api.base_url()))?;

    println!("Server:      {}", api.base_url());
    println!("Duration:    {} minutes", remote.duration_minutes());
    match remote.total_mcq {
        Some(n) => println!("Questions:   {n}"),
        None => println!("Questions:   not reported"),
    }
    let coding = match remote.has_coding {
        Some(true) => "yes",
        Some(false) => "no",
        None => "not reported",
    };
    println!("Coding:      {coding}");

    Ok(())
}

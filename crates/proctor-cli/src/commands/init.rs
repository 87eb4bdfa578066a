//! The `proctor init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("proctor.toml").exists() {
        println!("proctor.toml already exists, skipping.");
        return Ok(());
    }
    std::fs::write("proctor.toml", SAMPLE_CONFIG)?;
    println!("Created proctor.toml");

    println!("\nNext steps:");
    println!("  1. Point api_base at your assessment server");
    println!("  2. Run: proctor check");
    println!("  3. Run: proctor take");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# proctor configuration

# Assessment server. ${VAR} references are expanded from the environment,
# and PROCTOR_API_BASE overrides this value.
api_base = "http://localhost:8000"
request_timeout_secs = 30

# How often the countdown is refreshed, in milliseconds.
tick_interval_ms = 250

# Pause after answering before the next question appears. 0 disables it.
advance_delay_ms = 1000

allow_back_navigation = false

# Also post a scored record to /api/submit_result after submitting.
record_results = false

# Where the interview_results_*.json file is written.
export_results = true
export_dir = "."
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_parses() {
        let config: proctor_client::ProctorConfig = load_sample(SAMPLE_CONFIG);
        assert_eq!(config, proctor_client::ProctorConfig::default());
    }

    fn load_sample(s: &str) -> proctor_client::ProctorConfig {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proctor.toml");
        std::fs::write(&path, s).unwrap();
        std::env::remove_var("PROCTOR_API_BASE");
        proctor_client::load_config_from(Some(&path)).unwrap()
    }
}

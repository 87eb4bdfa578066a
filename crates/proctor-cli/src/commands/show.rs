//! The `proctor show` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::Table;

use proctor_report::summary::{coding_status, mcq_score};
use proctor_report::ResultsExport;

pub fn execute(file: PathBuf) -> Result<()> {
    let export = ResultsExport::load_json(&file)?;
    let info = &export.session_info;

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec![
        "Candidate",
        export.result.candidate_name.as_deref().unwrap_or("unknown"),
    ]);
    table.add_row(vec!["Session", info.session_id.as_str()]);
    table.add_row(vec![
        "Date".to_string(),
        format!("{} {}", info.interview_date, info.interview_time),
    ]);
    table.add_row(vec!["Multiple choice".to_string(), mcq_score(&export.result)]);
    table.add_row(vec!["Coding round".to_string(), coding_status(&export.result)]);
    for (key, value) in &export.result.extra {
        table.add_row(vec![key.clone(), value.to_string()]);
    }

    println!("{table}");
    Ok(())
}

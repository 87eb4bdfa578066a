//! The `proctor take` command.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Table};
use tokio::sync::mpsc;
use tracing::info;

use proctor_client::load_config_from;
use proctor_core::controller::{CodingView, QuestionView, SessionController};
use proctor_core::input::CODING_HELP;
use proctor_core::model::{SubmitResult, TestCodeOutcome};
use proctor_core::runner::{SessionOutcome, SessionRunner, View};
use proctor_core::timer::{format_remaining, SystemClock};
use proctor_report::summary::{format_result, format_test_outcome};
use proctor_report::ResultsExport;

pub struct TakeArgs {
    pub config: Option<PathBuf>,
    pub api_base: Option<String>,
    pub name: Option<String>,
    pub export_dir: Option<PathBuf>,
    pub no_feedback_delay: bool,
}

pub async fn execute(args: TakeArgs) -> Result<()> {
    let mut config = load_config_from(args.config.as_deref())?;
    if let Some(base) = args.api_base {
        config.api_base = base;
    }
    if let Some(dir) = args.export_dir {
        config.export_dir = dir;
    }
    if args.no_feedback_delay {
        config.advance_delay_ms = 0;
    }

    let api = config.create_api()?;
    info!(api_base = api.base_url(), "starting assessment");

    let mut runner = SessionRunner::new(
        SessionController::new(config.controller_options()),
        Arc::new(api),
        Arc::new(SystemClock),
        TerminalView::default(),
    )
    .with_tick_interval(config.tick_interval());

    let (tx, mut rx) = mpsc::channel(64);
    if let Some(name) = args.name {
        tx.send(name).await?;
    }
    spawn_stdin_reader(tx);

    let outcome = runner.run(&mut rx).await?;

    let export_path = if config.export_results {
        let export = ResultsExport::build(
            outcome.result.clone(),
            &outcome.session_id,
            chrono::Utc::now(),
        );
        Some(export.save(&config.export_dir, &outcome.candidate_name)?)
    } else {
        None
    };

    print_summary(&outcome, export_path.as_ref());
    Ok(())
}

/// Forward stdin lines to the session. Runs on a plain thread since a
/// blocking read cannot be cancelled.
fn spawn_stdin_reader(tx: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(|line| line.ok()) {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
}

fn print_summary(outcome: &SessionOutcome, export_path: Option<&PathBuf>) {
    let mut table = Table::new();
    table.set_header(vec!["Session", "Answered", "Code", "Time", "Results file"]);

    let time = outcome
        .payload
        .total_time_seconds
        .map(|s| format_remaining(Duration::from_secs(s)))
        .unwrap_or_else(|| "-".to_string());
    let code = match outcome.payload.code.as_deref() {
        Some(code) if !code.trim().is_empty() => format!("{} lines", code.lines().count()),
        _ => "none".to_string(),
    };
    table.add_row(vec![
        Cell::new(&outcome.session_id),
        Cell::new(outcome.payload.answers.len()),
        Cell::new(code),
        Cell::new(time),
        Cell::new(
            export_path
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "not written".to_string()),
        ),
    ]);

    println!("\n{table}");
}

/// Line-oriented terminal rendering of the session.
#[derive(Default)]
struct TerminalView {
    last_countdown: Option<u64>,
}

impl TerminalView {
    /// True when the countdown moved past a milestone since the last
    /// update, however coarse the ticks are.
    fn should_show_countdown(&mut self, remaining: Duration) -> bool {
        let secs = remaining.as_secs();
        match self.last_countdown.replace(secs) {
            None => true,
            Some(prev) if secs >= prev => false,
            Some(prev) => crossed_milestone(prev, secs),
        }
    }
}

/// Whether a milestone (whole minutes, then 30s, 10s and zero) lies in
/// `secs..prev`. Requires `secs < prev`.
fn crossed_milestone(prev: u64, secs: u64) -> bool {
    let last_minute = (prev - 1) / 60 * 60;
    last_minute >= secs || [30, 10, 0].iter().any(|&m| secs <= m && m < prev)
}

fn flush() {
    let _ = std::io::stdout().flush();
}

impl View for TerminalView {
    fn show_start(&mut self, duration_minutes: u32, total_questions: Option<u32>) {
        println!("Timed assessment: {duration_minutes} minutes.");
        if let Some(n) = total_questions {
            println!("{n} multiple-choice questions.");
        }
        print!("Enter your name to begin: ");
        flush();
    }

    fn show_validation(&mut self, message: &str) {
        println!("{message}");
    }

    fn show_question(&mut self, view: &QuestionView) {
        println!(
            "\nQuestion {} of {}\n{}",
            view.index + 1,
            view.total,
            view.question.question
        );
        for (i, choice) in view.question.choices.iter().enumerate() {
            let marker = if view.selected == Some(i) { "*" } else { " " };
            println!(" {marker}{}. {choice}", i + 1);
        }
        print!("Answer: ");
        flush();
    }

    fn show_coding(&mut self, coding: &CodingView) {
        match &coding.exercise {
            Some(exercise) => {
                println!("\n== {} ==", exercise.title);
                if !exercise.prompt.is_empty() {
                    println!("{}", exercise.prompt);
                }
            }
            None => println!("\n== Coding Round ==\nNo coding exercise. Type :submit to finish."),
        }
        println!("{CODING_HELP}");
        if !coding.code.is_empty() {
            println!("--- editor ---\n{}--------------", coding.code);
        }
    }

    fn show_editor(&mut self, code: &str) {
        println!("--- editor ---\n{code}--------------");
    }

    fn show_countdown(&mut self, remaining: Duration) {
        if self.should_show_countdown(remaining) {
            println!("[time remaining {}]", format_remaining(remaining));
        }
    }

    fn show_test_report(&mut self, outcome: &TestCodeOutcome) {
        println!("{}", format_test_outcome(outcome));
    }

    fn alert(&mut self, message: &str) {
        println!("! {message}");
    }

    fn show_result(&mut self, result: &SubmitResult) {
        println!("\n{}", format_result(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_is_shown_at_milestones_only() {
        let mut view = TerminalView::default();
        assert!(view.should_show_countdown(Duration::from_secs(125)));
        assert!(!view.should_show_countdown(Duration::from_secs(125)));
        assert!(!view.should_show_countdown(Duration::from_secs(124)));
        assert!(view.should_show_countdown(Duration::from_secs(120)));
        assert!(!view.should_show_countdown(Duration::from_secs(61)));
        assert!(view.should_show_countdown(Duration::from_secs(60)));
        assert!(!view.should_show_countdown(Duration::from_secs(45)));
        assert!(view.should_show_countdown(Duration::from_secs(30)));
        assert!(!view.should_show_countdown(Duration::from_secs(12)));
        assert!(view.should_show_countdown(Duration::from_secs(10)));
        assert!(view.should_show_countdown(Duration::ZERO));
    }

    #[test]
    fn coarse_ticks_still_hit_milestones() {
        let mut view = TerminalView::default();
        assert!(view.should_show_countdown(Duration::from_secs(185)));
        // Skips 180 exactly, but passes it.
        assert!(view.should_show_countdown(Duration::from_secs(178)));
        assert!(!view.should_show_countdown(Duration::from_secs(171)));
        assert!(view.should_show_countdown(Duration::from_secs(27)));
        assert!(view.should_show_countdown(Duration::from_secs(7)));
        assert!(!view.should_show_countdown(Duration::from_secs(3)));
        assert!(view.should_show_countdown(Duration::ZERO));
    }
}

//! Plain-text rendering of test runs and submission results.

use std::fmt::Write;

use serde_json::Value;

use proctor_core::model::{SubmitResult, TestCodeOutcome};

/// Render a `/api/test-code` outcome the way the candidate sees it.
pub fn format_test_outcome(outcome: &TestCodeOutcome) -> String {
    if let Some(error) = &outcome.error {
        return format!("Error: {error}");
    }

    let mut out = String::from("Test Results:\n\n");
    for (i, test) in outcome.details.iter().enumerate() {
        let status = if test.passed { "PASSED" } else { "FAILED" };
        let _ = writeln!(out, "Test {}: {status}", i + 1);
        let _ = writeln!(out, "Input: {}", compact(&test.input));
        if let Some(expected) = &test.expected {
            let _ = writeln!(out, "Expected: {}", compact(expected));
        }
        if let Some(actual) = &test.actual {
            let _ = writeln!(out, "Your output: {}", compact(actual));
        }
        if let Some(error) = &test.error {
            let _ = writeln!(out, "Error: {error}");
        }
        out.push('\n');
    }
    if outcome.details.is_empty() {
        out.push_str("No tests were run.\n");
    } else if outcome.passed {
        out.push_str("All tests passed.\n");
    } else {
        let passed = outcome.details.iter().filter(|t| t.passed).count();
        let _ = writeln!(out, "{passed}/{} tests passed.", outcome.details.len());
    }
    out
}

/// One-line multiple-choice score, e.g. `4 / 5`.
///
/// Scores the server sent in an unexpected shape are shown as sent.
pub fn mcq_score(result: &SubmitResult) -> String {
    let score = result
        .score_mcq
        .map(|s| s.to_string())
        .or_else(|| raw_field(result, "score_mcq"));
    let total = result
        .total_mcq
        .map(|t| t.to_string())
        .or_else(|| raw_field(result, "total_mcq"));
    match (score, total) {
        (Some(score), Some(total)) => format!("{score} / {total}"),
        (Some(score), None) => score,
        _ => "n/a".to_string(),
    }
}

fn raw_field(result: &SubmitResult, key: &str) -> Option<String> {
    match result.extra.get(key)? {
        Value::String(s) => Some(s.clone()),
        other => Some(compact(other)),
    }
}

/// Short description of the coding round result.
pub fn coding_status(result: &SubmitResult) -> String {
    match &result.coding_result {
        None | Some(Value::Null) => "not submitted".to_string(),
        Some(Value::Object(map)) => match map.get("passed").and_then(Value::as_bool) {
            Some(true) => "passed".to_string(),
            Some(false) => "failed".to_string(),
            None => compact(&Value::Object(map.clone())),
        },
        Some(other) => compact(other),
    }
}

/// Render a submission result as a few lines of text.
pub fn format_result(result: &SubmitResult) -> String {
    let mut out = String::from("Interview Completed!\nThank you for taking the assessment.\n\n");
    if let Some(name) = &result.candidate_name {
        let _ = writeln!(out, "Candidate:       {name}");
    }
    let _ = writeln!(out, "Multiple choice: {}", mcq_score(result));
    let _ = writeln!(out, "Coding round:    {}", coding_status(result));
    out
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

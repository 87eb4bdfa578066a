//! Core data model types for proctor.
//!
//! These mirror the JSON contract of the remote assessment API plus the
//! client-side session bookkeeping built on top of it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Duration used when the server does not report one.
pub const DEFAULT_DURATION_MINUTES: u32 = 45;

/// Assessment configuration published by `/api/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Time allowed for the whole assessment, in minutes.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// Number of multiple-choice questions, if the server reports it.
    #[serde(default)]
    pub total_mcq: Option<u32>,
    /// Whether a coding round is configured.
    #[serde(default)]
    pub has_coding: Option<bool>,
}

impl Config {
    /// Effective duration. Missing or zero falls back to 45 minutes.
    pub fn duration_minutes(&self) -> u32 {
        match self.duration_minutes {
            Some(minutes) if minutes > 0 => minutes,
            _ => DEFAULT_DURATION_MINUTES,
        }
    }
}

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question: String,
    pub choices: Vec<String>,
}

/// The optional coding round that follows the question sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingExercise {
    #[serde(default = "default_coding_title")]
    pub title: String,
    #[serde(default)]
    pub prompt: String,
    /// Seed content for the code editor.
    #[serde(default)]
    pub function_signature: String,
}

fn default_coding_title() -> String {
    "Coding Round".to_string()
}

/// Response of `/api/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: String,
}

/// One candidate's attempt. The id is opaque and threaded through every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
}

/// Most recent choice per question id.
///
/// Entries are only ever inserted or overwritten, never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerMap {
    selections: HashMap<String, usize>,
}

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a selection, replacing any earlier one for the same question.
    pub fn record(&mut self, question_id: &str, choice_index: usize) {
        self.selections.insert(question_id.to_string(), choice_index);
    }

    pub fn get(&self, question_id: &str) -> Option<usize> {
        self.selections.get(question_id).copied()
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Answers in question-sequence order.
    ///
    /// Ids that do not belong to `questions` are appended last, sorted, so
    /// the output is deterministic either way.
    pub fn to_answers(&self, questions: &[Question]) -> Vec<Answer> {
        let mut answers: Vec<Answer> = questions
            .iter()
            .filter_map(|q| {
                self.get(&q.id).map(|choice_index| Answer {
                    qid: q.id.clone(),
                    choice_index,
                })
            })
            .collect();

        let mut stray: Vec<Answer> = self
            .selections
            .iter()
            .filter(|(qid, _)| !questions.iter().any(|q| &q.id == *qid))
            .map(|(qid, &choice_index)| Answer {
                qid: qid.clone(),
                choice_index,
            })
            .collect();
        stray.sort_by(|a, b| a.qid.cmp(&b.qid));
        answers.extend(stray);
        answers
    }
}

/// A single recorded answer as sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub qid: String,
    pub choice_index: usize,
}

/// Body of `/api/submit`. Built once and sent once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub session_id: String,
    pub answers: Vec<Answer>,
    /// Editor content; `None` if the coding screen was never opened.
    pub code: Option<String>,
    pub total_time_seconds: Option<u64>,
}

/// Body of `/api/test-code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCodeRequest {
    pub code: String,
    pub session_id: String,
}

/// Result of running the candidate's code against the reference tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCodeOutcome {
    /// Remote-reported logical error (syntax error, missing function, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Vec<TestCaseDetail>,
    #[serde(default)]
    pub passed: bool,
}

/// Outcome of one reference test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseDetail {
    pub passed: bool,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `/api/submit`.
///
/// Only a handful of fields are interpreted; everything else is kept so the
/// exported results file carries the full server response. A field whose
/// value does not fit its typed slot (a fractional score, say) stays in
/// `extra` untouched instead of failing the whole response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Map<String, serde_json::Value>")]
pub struct SubmitResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_mcq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_mcq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coding_result: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl From<serde_json::Map<String, serde_json::Value>> for SubmitResult {
    fn from(mut extra: serde_json::Map<String, serde_json::Value>) -> Self {
        let candidate_name = take_typed(&mut extra, "candidate_name");
        let score_mcq = take_typed(&mut extra, "score_mcq");
        let total_mcq = take_typed(&mut extra, "total_mcq");
        let coding_result = extra.remove("coding_result").filter(|v| !v.is_null());
        Self {
            candidate_name,
            score_mcq,
            total_mcq,
            coding_result,
            extra,
        }
    }
}

/// Move `key` out of `map` if it decodes as `T`. Nulls are dropped;
/// mismatched values are left in place.
fn take_typed<T: DeserializeOwned>(
    map: &mut serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<T> {
    let value = map.get(key)?;
    if value.is_null() {
        map.remove(key);
        return None;
    }
    let typed = serde_json::from_value(value.clone()).ok()?;
    map.remove(key);
    Some(typed)
}

/// Body of `/api/submit_result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    pub responses: Vec<Answer>,
    pub score: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> Question {
        Question {
            id: id.into(),
            question: format!("question {id}"),
            choices: vec!["a".into(), "b".into(), "c".into()],
        }
    }

    #[test]
    fn config_duration_defaults() {
        assert_eq!(Config::default().duration_minutes(), 45);
        let zero = Config {
            duration_minutes: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.duration_minutes(), 45);
        let cfg: Config = serde_json::from_str(r#"{"duration_minutes": 30}"#).unwrap();
        assert_eq!(cfg.duration_minutes(), 30);
    }

    #[test]
    fn answer_map_overwrites() {
        let mut answers = AnswerMap::new();
        answers.record("q1", 0);
        answers.record("q1", 2);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers.get("q1"), Some(2));
    }

    #[test]
    fn answers_follow_question_order() {
        let questions = vec![question("q10"), question("q2"), question("q3")];
        let mut answers = AnswerMap::new();
        answers.record("q3", 1);
        answers.record("q10", 0);

        let list = answers.to_answers(&questions);
        let ids: Vec<&str> = list.iter().map(|a| a.qid.as_str()).collect();
        assert_eq!(ids, vec!["q10", "q3"]);
    }

    #[test]
    fn coding_exercise_title_default() {
        let ex: CodingExercise =
            serde_json::from_str(r#"{"prompt": "p", "function_signature": "def f():\n"}"#)
                .unwrap();
        assert_eq!(ex.title, "Coding Round");
    }

    #[test]
    fn submit_result_keeps_unknown_fields() {
        let json = r#"{"score_mcq": 2, "total_mcq": 3, "grade": "B"}"#;
        let result: SubmitResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.score_mcq, Some(2));
        assert_eq!(result.extra.get("grade").unwrap(), "B");

        let back = serde_json::to_value(&result).unwrap();
        assert_eq!(back["grade"], "B");
        assert!(back.get("candidate_name").is_none());
    }

    #[test]
    fn submit_result_tolerates_unexpected_score_types() {
        let json = r#"{"candidate_name": "Ada", "score_mcq": 2.5, "total_mcq": "3/3", "coding_result": null}"#;
        let result: SubmitResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.candidate_name.as_deref(), Some("Ada"));
        assert_eq!(result.score_mcq, None);
        assert_eq!(result.total_mcq, None);
        assert_eq!(result.coding_result, None);
        assert_eq!(result.extra["score_mcq"], serde_json::json!(2.5));

        // The raw values survive a round trip through the export format.
        let back = serde_json::to_value(&result).unwrap();
        assert_eq!(back["score_mcq"], serde_json::json!(2.5));
        assert_eq!(back["total_mcq"], "3/3");
        assert_eq!(back["candidate_name"], "Ada");
    }
}

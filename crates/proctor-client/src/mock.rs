//! In-memory assessment server for tests and offline demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::json;

use proctor_core::model::{
    CodingExercise, Config, Question, ResultRecord, StartResponse, SubmissionPayload,
    SubmitResult, TestCaseDetail, TestCodeOutcome, TestCodeRequest,
};
use proctor_core::traits::AssessmentApi;

use crate::error::ApiError;

/// A mock assessment API.
///
/// Issues fresh session ids, scores submissions against an answer key and
/// records every call so tests can assert on what the session sent.
pub struct MockApi {
    config: Config,
    questions: Vec<Question>,
    answer_key: HashMap<String, usize>,
    coding: Option<CodingExercise>,
    test_outcome: TestCodeOutcome,
    start_error: Option<String>,
    submit_error: Option<String>,
    sessions: Mutex<HashMap<String, String>>,
    start_calls: AtomicU32,
    test_calls: AtomicU32,
    submit_calls: AtomicU32,
    last_payload: Mutex<Option<SubmissionPayload>>,
    recorded: Mutex<Vec<ResultRecord>>,
}

impl MockApi {
    /// Create a mock serving `questions` with no coding round.
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            config: Config {
                duration_minutes: None,
                total_mcq: Some(questions.len() as u32),
                has_coding: Some(false),
            },
            questions,
            answer_key: HashMap::new(),
            coding: None,
            test_outcome: TestCodeOutcome {
                error: None,
                details: vec![],
                passed: true,
            },
            start_error: None,
            submit_error: None,
            sessions: Mutex::new(HashMap::new()),
            start_calls: AtomicU32::new(0),
            test_calls: AtomicU32::new(0),
            submit_calls: AtomicU32::new(0),
            last_payload: Mutex::new(None),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Three arithmetic questions, an answer key, and a small coding round.
    pub fn sample() -> Self {
        let questions = vec![
            question("q1", "What is 2 + 2?", &["3", "4", "5"]),
            question("q2", "What is 3 * 3?", &["6", "9", "12"]),
            question("q3", "What is 10 / 2?", &["2", "5", "8"]),
        ];
        let coding = CodingExercise {
            title: "Sum of a list".into(),
            prompt: "Return the sum of the integers in `xs`.".into(),
            function_signature: "def total(xs):\n".into(),
        };
        let details = vec![
            TestCaseDetail {
                passed: true,
                input: json!([1, 2, 3]),
                expected: Some(json!(6)),
                actual: Some(json!(6)),
                error: None,
            },
            TestCaseDetail {
                passed: true,
                input: json!([]),
                expected: Some(json!(0)),
                actual: Some(json!(0)),
                error: None,
            },
        ];
        Self::new(questions)
            .with_answer_key([("q1", 1), ("q2", 1), ("q3", 1)])
            .with_coding(Some(coding))
            .with_test_outcome(TestCodeOutcome {
                error: None,
                details,
                passed: true,
            })
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.config.duration_minutes = Some(minutes);
        self
    }

    pub fn with_answer_key<'a>(mut self, key: impl IntoIterator<Item = (&'a str, usize)>) -> Self {
        self.answer_key = key
            .into_iter()
            .map(|(id, index)| (id.to_string(), index))
            .collect();
        self
    }

    pub fn with_coding(mut self, coding: Option<CodingExercise>) -> Self {
        self.config.has_coding = Some(coding.is_some());
        self.coding = coding;
        self
    }

    pub fn with_test_outcome(mut self, outcome: TestCodeOutcome) -> Self {
        self.test_outcome = outcome;
        self
    }

    /// Make `/api/start` fail with `message`.
    pub fn failing_start(mut self, message: &str) -> Self {
        self.start_error = Some(message.to_string());
        self
    }

    /// Make `/api/submit` fail with `message`.
    pub fn failing_submit(mut self, message: &str) -> Self {
        self.submit_error = Some(message.to_string());
        self
    }

    pub fn start_calls(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn test_calls(&self) -> u32 {
        self.test_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// The most recent submission received.
    pub fn last_payload(&self) -> Option<SubmissionPayload> {
        lock(&self.last_payload).clone()
    }

    /// Records posted to `/api/submit_result`.
    pub fn recorded(&self) -> Vec<ResultRecord> {
        lock(&self.recorded).clone()
    }

    fn score(&self, payload: &SubmissionPayload) -> u32 {
        payload
            .answers
            .iter()
            .filter(|a| self.answer_key.get(&a.qid) == Some(&a.choice_index))
            .count() as u32
    }
}

fn question(id: &str, text: &str, choices: &[&str]) -> Question {
    Question {
        id: id.into(),
        question: text.into(),
        choices: choices.iter().map(|c| c.to_string()).collect(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl AssessmentApi for MockApi {
    async fn config(&self) -> anyhow::Result<Config> {
        Ok(self.config.clone())
    }

    async fn start(&self, name: &str) -> anyhow::Result<StartResponse> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.start_error {
            return Err(ApiError::Api {
                status: 500,
                message: message.clone(),
            }
            .into());
        }
        let session_id = uuid::Uuid::new_v4().to_string();
        lock(&self.sessions).insert(session_id.clone(), name.to_string());
        Ok(StartResponse { session_id })
    }

    async fn questions(&self, session_id: &str) -> anyhow::Result<Vec<Question>> {
        if !lock(&self.sessions).contains_key(session_id) {
            return Err(ApiError::InvalidSession(session_id.to_string()).into());
        }
        Ok(self.questions.clone())
    }

    async fn coding(&self) -> anyhow::Result<Option<CodingExercise>> {
        Ok(self.coding.clone())
    }

    async fn test_code(&self, request: &TestCodeRequest) -> anyhow::Result<TestCodeOutcome> {
        self.test_calls.fetch_add(1, Ordering::SeqCst);
        if request.code.trim().is_empty() {
            return Ok(TestCodeOutcome {
                error: Some("No code provided".into()),
                details: vec![],
                passed: false,
            });
        }
        Ok(self.test_outcome.clone())
    }

    async fn submit(&self, payload: &SubmissionPayload) -> anyhow::Result<SubmitResult> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_payload) = Some(payload.clone());

        if let Some(message) = &self.submit_error {
            return Err(ApiError::Api {
                status: 500,
                message: message.clone(),
            }
            .into());
        }
        let Some(name) = lock(&self.sessions).get(&payload.session_id).cloned() else {
            return Err(ApiError::InvalidSession(payload.session_id.clone()).into());
        };

        let coding_result = payload
            .code
            .as_ref()
            .map(|_| serde_json::to_value(&self.test_outcome))
            .transpose()?;
        Ok(SubmitResult {
            candidate_name: Some(name),
            score_mcq: Some(self.score(payload)),
            total_mcq: Some(self.questions.len() as u32),
            coding_result,
            extra: serde_json::Map::new(),
        })
    }

    async fn record_result(&self, record: &ResultRecord) -> anyhow::Result<()> {
        lock(&self.recorded).push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::model::Answer;

    #[tokio::test]
    async fn sessions_are_unique() {
        let api = MockApi::sample();
        let a = api.start("Ada").await.unwrap();
        let b = api.start("Grace").await.unwrap();
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(api.start_calls(), 2);
    }

    #[tokio::test]
    async fn scores_against_answer_key() {
        let api = MockApi::sample();
        let session = api.start("Ada").await.unwrap();
        let payload = SubmissionPayload {
            session_id: session.session_id,
            answers: vec![
                Answer {
                    qid: "q1".into(),
                    choice_index: 1,
                },
                Answer {
                    qid: "q2".into(),
                    choice_index: 0,
                },
            ],
            code: None,
            total_time_seconds: Some(10),
        };

        let result = api.submit(&payload).await.unwrap();
        assert_eq!(result.candidate_name.as_deref(), Some("Ada"));
        assert_eq!(result.score_mcq, Some(1));
        assert_eq!(result.total_mcq, Some(3));
        assert_eq!(result.coding_result, None);
        assert_eq!(api.last_payload(), Some(payload));
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let api = MockApi::sample();
        let err = api.questions("nope").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::InvalidSession(_))
        ));
    }

    #[tokio::test]
    async fn empty_code_reports_error() {
        let api = MockApi::sample();
        let outcome = api
            .test_code(&TestCodeRequest {
                code: "   ".into(),
                session_id: "s".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.error.as_deref(), Some("No code provided"));
        assert_eq!(api.test_calls(), 1);
    }

    #[tokio::test]
    async fn failing_submit_still_counts_the_call() {
        let api = MockApi::sample().failing_submit("database down");
        let session = api.start("Ada").await.unwrap();
        let payload = SubmissionPayload {
            session_id: session.session_id,
            answers: vec![],
            code: None,
            total_time_seconds: None,
        };
        let err = api.submit(&payload).await.unwrap_err();
        assert!(err.to_string().contains("database down"));
        assert_eq!(api.submit_calls(), 1);
    }
}

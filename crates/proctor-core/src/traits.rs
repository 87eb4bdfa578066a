//! The seam between the session runner and the remote assessment service.
//!
//! Implemented over HTTP by `proctor-client`, and by in-memory mocks in tests.

use async_trait::async_trait;

use crate::model::{
    CodingExercise, Config, Question, ResultRecord, StartResponse, SubmissionPayload,
    SubmitResult, TestCodeOutcome, TestCodeRequest,
};

/// Remote assessment API consumed by the client.
#[async_trait]
pub trait AssessmentApi: Send + Sync {
    /// Fetch the assessment configuration (`GET /api/config`).
    async fn config(&self) -> anyhow::Result<Config>;

    /// Create a session for the named candidate (`POST /api/start`).
    async fn start(&self, name: &str) -> anyhow::Result<StartResponse>;

    /// Question sequence for a session (`GET /api/questions`).
    async fn questions(&self, session_id: &str) -> anyhow::Result<Vec<Question>>;

    /// The coding exercise, or `None` when none is configured.
    async fn coding(&self) -> anyhow::Result<Option<CodingExercise>>;

    /// Run candidate code against the reference tests (`POST /api/test-code`).
    async fn test_code(&self, request: &TestCodeRequest) -> anyhow::Result<TestCodeOutcome>;

    /// Submit the session (`POST /api/submit`).
    async fn submit(&self, payload: &SubmissionPayload) -> anyhow::Result<SubmitResult>;

    /// Record a scored result (`POST /api/submit_result`). The response body is ignored.
    async fn record_result(&self, record: &ResultRecord) -> anyhow::Result<()>;
}

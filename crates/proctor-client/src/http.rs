//! HTTP implementation of the assessment API.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use proctor_core::model::{
    CodingExercise, Config, Question, ResultRecord, StartResponse, SubmissionPayload,
    SubmitResult, TestCodeOutcome, TestCodeRequest,
};
use proctor_core::traits::AssessmentApi;

use crate::error::ApiError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for the remote assessment API.
pub struct HttpApi {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpApi {
    /// Create a client rooted at `base_url` (trailing slashes are ignored;
    /// empty means the default local server).
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = base_url.trim().trim_end_matches('/');
        let base = if base.is_empty() { DEFAULT_BASE_URL } else { base };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base.to_string(),
            timeout_secs: timeout.as_secs(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                ApiError::Network(format!(
                    "assessment server not reachable at {}",
                    self.base_url
                ))
            } else {
                ApiError::Network(e.to_string())
            }
        })
    }
}

#[derive(Serialize)]
struct StartRequest<'a> {
    name: &'a str,
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Turn a non-2xx response into an [`ApiError`].
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| match e.detail {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or(body);
    Err(ApiError::Api { status, message })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl AssessmentApi for HttpApi {
    #[instrument(skip(self))]
    async fn config(&self) -> anyhow::Result<Config> {
        let response = self.send(self.client.get(self.url("/api/config"))).await?;
        let response = check_status(response).await?;
        Ok(decode(response).await?)
    }

    #[instrument(skip(self, name))]
    async fn start(&self, name: &str) -> anyhow::Result<StartResponse> {
        let request = self
            .client
            .post(self.url("/api/start"))
            .json(&StartRequest { name });
        let response = check_status(self.send(request).await?).await?;
        Ok(decode(response).await?)
    }

    #[instrument(skip(self))]
    async fn questions(&self, session_id: &str) -> anyhow::Result<Vec<Question>> {
        let url = Url::parse_with_params(&self.url("/api/questions"), &[("session_id", session_id)])
            .with_context(|| format!("invalid API base URL: {}", self.base_url))?;
        let response = check_status(self.send(self.client.get(url)).await?).await?;
        Ok(decode(response).await?)
    }

    #[instrument(skip(self))]
    async fn coding(&self) -> anyhow::Result<Option<CodingExercise>> {
        let response = self.send(self.client.get(self.url("/api/coding"))).await?;
        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "no coding exercise");
            return Ok(None);
        }
        Ok(Some(decode(response).await?))
    }

    #[instrument(skip(self, request), fields(session_id = %request.session_id))]
    async fn test_code(&self, request: &TestCodeRequest) -> anyhow::Result<TestCodeOutcome> {
        let builder = self.client.post(self.url("/api/test-code")).json(request);
        let response = check_status(self.send(builder).await?).await?;
        Ok(decode(response).await?)
    }

    #[instrument(skip(self, payload), fields(session_id = %payload.session_id))]
    async fn submit(&self, payload: &SubmissionPayload) -> anyhow::Result<SubmitResult> {
        let builder = self.client.post(self.url("/api/submit")).json(payload);
        let response = self.send(builder).await?;
        if response.status().as_u16() == 404 {
            return Err(ApiError::InvalidSession(payload.session_id.clone()).into());
        }
        let response = check_status(response).await?;
        Ok(decode(response).await?)
    }

    #[instrument(skip(self, record), fields(name = %record.name))]
    async fn record_result(&self, record: &ResultRecord) -> anyhow::Result<()> {
        let builder = self.client.post(self.url("/api/submit_result")).json(record);
        check_status(self.send(builder).await?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::model::Answer;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> HttpApi {
        HttpApi::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn base_url_normalisation() {
        let api = HttpApi::new("http://example.test:9000/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url(), "http://example.test:9000");
        let api = HttpApi::new("", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url(), DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn fetches_config() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "duration_minutes": 30,
                "total_mcq": 5,
                "has_coding": true
            })))
            .mount(&server)
            .await;

        let config = api(&server).config().await.unwrap();
        assert_eq!(config.duration_minutes(), 30);
        assert_eq!(config.total_mcq, Some(5));
        assert_eq!(config.has_coding, Some(true));
    }

    #[tokio::test]
    async fn start_then_questions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/start"))
            .and(body_json(serde_json::json!({"name": "Ada"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"session_id": "abc"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/questions"))
            .and(query_param("session_id", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "q1", "question": "2 + 2?", "choices": ["3", "4"]}
            ])))
            .mount(&server)
            .await;

        let api = api(&server);
        let session = api.start("Ada").await.unwrap();
        assert_eq!(session.session_id, "abc");

        let questions = api.questions(&session.session_id).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].choices, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn missing_coding_exercise_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/coding"))
            .respond_with(ResponseTemplate::new(404).set_body_json(
                serde_json::json!({"detail": "No coding round configured"}),
            ))
            .mount(&server)
            .await;

        assert_eq!(api(&server).coding().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_code_reports_remote_error_as_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/test-code"))
            .and(body_json(serde_json::json!({"code": "def f(", "session_id": "abc"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"error": "SyntaxError: unexpected EOF", "details": [], "passed": false}),
            ))
            .mount(&server)
            .await;

        let outcome = api(&server)
            .test_code(&TestCodeRequest {
                code: "def f(".into(),
                session_id: "abc".into(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.error.as_deref(), Some("SyntaxError: unexpected EOF"));
        assert!(!outcome.passed);
    }

    #[tokio::test]
    async fn submit_sends_payload() {
        let server = MockServer::start().await;
        let payload = SubmissionPayload {
            session_id: "abc".into(),
            answers: vec![Answer {
                qid: "q1".into(),
                choice_index: 1,
            }],
            code: None,
            total_time_seconds: Some(42),
        };
        Mock::given(method("POST"))
            .and(path("/api/submit"))
            .and(body_json(serde_json::json!({
                "session_id": "abc",
                "answers": [{"qid": "q1", "choice_index": 1}],
                "code": null,
                "total_time_seconds": 42
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidate_name": "Ada",
                "score_mcq": 1,
                "total_mcq": 1,
                "coding_result": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = api(&server).submit(&payload).await.unwrap();
        assert_eq!(result.candidate_name.as_deref(), Some("Ada"));
        assert_eq!(result.score_mcq, Some(1));
    }

    #[tokio::test]
    async fn submit_accepts_fractional_score() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidate_name": "Ada",
                "score_mcq": 2.5,
                "total_mcq": 3
            })))
            .mount(&server)
            .await;

        let payload = SubmissionPayload {
            session_id: "abc".into(),
            answers: vec![],
            code: None,
            total_time_seconds: Some(5),
        };
        let result = api(&server).submit(&payload).await.unwrap();
        assert_eq!(result.candidate_name.as_deref(), Some("Ada"));
        assert_eq!(result.score_mcq, None);
        assert_eq!(result.total_mcq, Some(3));
        assert_eq!(result.extra["score_mcq"], serde_json::json!(2.5));
    }

    #[tokio::test]
    async fn submit_unknown_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/submit"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "Invalid session"})),
            )
            .mount(&server)
            .await;

        let payload = SubmissionPayload {
            session_id: "gone".into(),
            answers: vec![],
            code: None,
            total_time_seconds: None,
        };
        let err = api(&server).submit(&payload).await.unwrap_err();
        let api_err = err.downcast_ref::<ApiError>().unwrap();
        assert!(matches!(api_err, ApiError::InvalidSession(id) if id == "gone"));
        assert_eq!(api_err.status(), Some(404));
    }

    #[tokio::test]
    async fn server_error_detail_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/start"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"detail": "database down"})),
            )
            .mount(&server)
            .await;

        let err = api(&server).start("Ada").await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));
        assert!(err.to_string().contains("database down"));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        // Nothing listens on port 9 on test machines.
        let api = HttpApi::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = api.config().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::Network(_)) | Some(ApiError::Timeout(_))
        ));
    }
}

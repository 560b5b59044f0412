//! HTTP content source and progress sink.
//!
//! Questions come from `GET {base}/api/content/quiz?module=<id>` and
//! completion events are posted to `POST {base}/api/progress`.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use learnpath_core::error::ProviderError;
use learnpath_core::model::{CompletionEvent, QuizQuestion};
use learnpath_core::traits::{ContentSource, ProgressSink};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn build_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .context("failed to build HTTP client")
}

fn trim_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

fn map_send_error(e: reqwest::Error, base_url: &str) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(DEFAULT_TIMEOUT_SECS)
    } else if e.is_connect() {
        ProviderError::NetworkError(format!("server not reachable at {base_url}: {e}"))
    } else {
        ProviderError::NetworkError(e.to_string())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Turn a non-success response into a classified error.
async fn check_status(
    response: reqwest::Response,
    resource: &str,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5)
            * 1000;
        return Err(ProviderError::RateLimited {
            retry_after_ms: retry_after,
        });
    }
    let body = response.text().await.unwrap_or_default();
    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(body));
    }
    if status == 404 {
        return Err(ProviderError::NotFound(resource.to_string()));
    }
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|e| e.error.or(e.message))
        .unwrap_or(body);
    Err(ProviderError::ApiError { status, message })
}

// ---------------------------------------------------------------------------
// Content source
// ---------------------------------------------------------------------------

/// Fetches question banks from the content API.
pub struct HttpContentSource {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpContentSource {
    pub fn new(base_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: trim_base(base_url),
            api_key: api_key.filter(|k| !k.is_empty()),
            client: build_client()?,
        })
    }
}

#[derive(Deserialize)]
struct QuizResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    questions: Vec<QuizQuestion>,
    #[serde(default)]
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

#[async_trait]
impl ContentSource for HttpContentSource {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn questions(&self, module_id: &str) -> anyhow::Result<Vec<QuizQuestion>> {
        let mut url = reqwest::Url::parse(&format!("{}/api/content/quiz", self.base_url))
            .with_context(|| format!("invalid content base URL: {}", self.base_url))?;
        url.query_pairs_mut().append_pair("module", module_id);

        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.base_url))?;
        let response = check_status(response, &format!("quiz for module '{module_id}'")).await?;

        let body: QuizResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status: 0,
            message: format!("failed to parse quiz response: {e}"),
        })?;
        if !body.success {
            return Err(ProviderError::ApiError {
                status: 200,
                message: body
                    .error
                    .unwrap_or_else(|| "content API reported failure".to_string()),
            }
            .into());
        }

        tracing::debug!(module = module_id, questions = body.questions.len(), "questions fetched");
        Ok(body.questions)
    }
}

// ---------------------------------------------------------------------------
// Progress sink
// ---------------------------------------------------------------------------

/// Posts completion events to the progress API.
pub struct HttpProgressSink {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpProgressSink {
    pub fn new(base_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: trim_base(base_url),
            api_key: api_key.filter(|k| !k.is_empty()),
            client: build_client()?,
        })
    }
}

#[async_trait]
impl ProgressSink for HttpProgressSink {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, event), fields(module = %event.module_id, lesson = %event.lesson_id))]
    async fn record(&self, event: &CompletionEvent) -> anyhow::Result<()> {
        let mut request = self
            .client
            .post(format!("{}/api/progress", self.base_url))
            .json(event);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.base_url))?;
        check_status(response, "/api/progress").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnpath_core::model::{Answer, QuestionKind};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event() -> CompletionEvent {
        CompletionEvent {
            module_id: "m1".into(),
            lesson_id: "quiz-m1".into(),
            completed: true,
            quiz_score: Some(80),
            time_spent: Some(95),
        }
    }

    #[tokio::test]
    async fn fetches_questions_in_wire_format() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "success": true,
            "questions": [
                {
                    "id": "q1", "type": "mcq",
                    "question": "Which phrase triggers chain-of-thought?",
                    "options": ["Be brief", "Let's think step by step"],
                    "answer": 1,
                    "explanation": "Step-by-step reasoning."
                },
                {"id": "q2", "type": "tf", "question": "Examples help.", "answer": true, "explanation": ""}
            ]
        });

        Mock::given(method("GET"))
            .and(path("/api/content/quiz"))
            .and(query_param("module", "m1"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let source = HttpContentSource::new(&server.uri(), Some("test-key".into())).unwrap();
        let questions = source.questions("m1").await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].kind, QuestionKind::MultipleChoice);
        assert_eq!(questions[0].correct_answer, Answer::Choice(1));
        assert_eq!(questions[1].correct_answer, Answer::Bool(true));
    }

    #[tokio::test]
    async fn unsuccessful_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/content/quiz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": false, "error": "module archived"})),
            )
            .mount(&server)
            .await;

        let source = HttpContentSource::new(&server.uri(), None).unwrap();
        let err = source.questions("m1").await.unwrap_err();
        assert!(err.to_string().contains("module archived"));
    }

    #[tokio::test]
    async fn missing_module_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/content/quiz"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpContentSource::new(&server.uri(), None).unwrap();
        let err = source.questions("ghost").await.unwrap_err();
        let provider = err.downcast_ref::<ProviderError>().unwrap();
        assert!(provider.is_permanent());
        assert!(err.to_string().contains("ghost"));
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/content/quiz"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let source = HttpContentSource::new(&server.uri(), None).unwrap();
        let err = source.questions("m1").await.unwrap_err();
        let provider = err.downcast_ref::<ProviderError>().unwrap();
        assert_eq!(provider.retry_after_ms(), Some(3000));
        assert!(!provider.is_permanent());
    }

    #[tokio::test]
    async fn posts_camel_case_event() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/progress"))
            .and(body_json(serde_json::json!({
                "moduleId": "m1",
                "lessonId": "quiz-m1",
                "completed": true,
                "quizScore": 80,
                "timeSpent": 95
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpProgressSink::new(&format!("{}/", server.uri()), None).unwrap();
        sink.record(&event()).await.unwrap();
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/progress"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "db down"})),
            )
            .mount(&server)
            .await;

        let sink = HttpProgressSink::new(&server.uri(), None).unwrap();
        let err = sink.record(&event()).await.unwrap_err();
        let provider = err.downcast_ref::<ProviderError>().unwrap();
        assert!(!provider.is_permanent());
        assert!(err.to_string().contains("db down"));
    }

    #[tokio::test]
    async fn unauthorized_sink() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/progress"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let sink = HttpProgressSink::new(&server.uri(), Some("bad".into())).unwrap();
        let err = sink.record(&event()).await.unwrap_err();
        assert!(err.to_string().contains("authentication failed"));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let sink = HttpProgressSink::new("http://127.0.0.1:1", None).unwrap();
        let err = sink.record(&event()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::NetworkError(_)) | Some(ProviderError::Timeout(_))
        ));
    }
}

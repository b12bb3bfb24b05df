//! **Tutoring backend client** — the two remote calls the session depends on.
//!
//! `analyze_speech` scores a transcript and suggests corrections; `chat` gets
//! the tutor's reply. Each call is attempted exactly once: there is no retry
//! machinery here by design — a failed call is surfaced to the session, which
//! degrades to a synthetic assistant message. The bearer credential is an
//! opaque string owned by the auth layer; this client only attaches it.

use crate::error::{VoiceError, VoiceResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of speech-accuracy analysis for one voice turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechAnalysis {
    /// 0..=100 conversational accuracy score.
    pub accuracy: u8,
    /// Ordered improvement suggestions.
    pub corrections: Vec<String>,
}

/// The tutor's reply to one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

/// The remote tutoring backend as the session sees it.
#[async_trait]
pub trait TutorBackend: Send + Sync {
    /// Score `transcript` against `reference_text`. The session passes the
    /// transcript for both (self-comparison: conversational scoring, not
    /// scripted-phrase pronunciation).
    async fn analyze_speech(
        &self,
        transcript: &str,
        reference_text: &str,
    ) -> VoiceResult<SpeechAnalysis>;

    /// Get the tutor's reply to `message`.
    async fn chat(&self, message: &str) -> VoiceResult<ChatReply>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    transcript: &'a str,
    original_text: &'a str,
}

/// HTTP implementation of `TutorBackend` against the tutoring API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    /// Base URL without trailing slash (e.g. https://tutor.example.com).
    pub base_url: String,
    /// Opaque bearer credential from the session's auth layer.
    token: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(VoiceError::from_transport)?;
        Ok(Self {
            base_url: base_url.into(),
            token: token.into(),
            client,
        })
    }

    /// Build from environment: BACKEND_URL and BACKEND_TOKEN.
    pub fn from_env() -> VoiceResult<Self> {
        let base_url = std::env::var("BACKEND_URL")
            .map_err(|_| VoiceError::Config("BACKEND_URL not set".to_string()))?;
        let token = std::env::var("BACKEND_TOKEN")
            .map_err(|_| VoiceError::Config("BACKEND_TOKEN not set".to_string()))?;
        Self::new(base_url, token)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> VoiceResult<R>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let res = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(VoiceError::from_transport)?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            return Err(VoiceError::Backend {
                status: status.as_u16(),
                detail,
            });
        }
        res.json::<R>().await.map_err(VoiceError::from_transport)
    }
}

#[async_trait]
impl TutorBackend for HttpBackend {
    async fn analyze_speech(
        &self,
        transcript: &str,
        reference_text: &str,
    ) -> VoiceResult<SpeechAnalysis> {
        let body = AnalyzeRequest {
            transcript,
            original_text: reference_text,
        };
        self.post_json("/api/speech/analyze", &body).await
    }

    async fn chat(&self, message: &str) -> VoiceResult<ChatReply> {
        let body = ChatRequest { message };
        self.post_json("/api/chat", &body).await
    }
}

//! HTTP implementation of the remote collaborator.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;
use wordquiz_core::types::{MemorizedToggle, OfflineSnapshot, QuizProgressRecord, QuizResultRecord};

use super::{RemoteApi, RemoteError};

/// Header carrying the request id of a queued record.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct ToggleMemorizedRequest {
    memorized: bool,
}

/// Remote API over JSON/HTTP.
#[derive(Clone)]
pub struct HttpRemote {
    client: Client,
    backend_url: String,
    token: Option<String>,
}

impl HttpRemote {
    pub fn new(backend_url: &str, token: Option<String>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            client,
            backend_url: backend_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.backend_url, path)
    }

    /// `/api/words/{word_id}/memorized`, with the id encoded as one path segment.
    fn memorized_url(&self, word_id: &str) -> Result<Url, RemoteError> {
        let invalid = |detail: String| RemoteError::Network(format!("invalid backend url: {detail}"));
        let mut url = Url::parse(&self.url("/api/words")).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid(self.backend_url.clone()))?
            .push(word_id)
            .push("memorized");
        Ok(url)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn keyed(req: RequestBuilder, request_id: Uuid) -> RequestBuilder {
        req.header(IDEMPOTENCY_HEADER, request_id.to_string())
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, RemoteError> {
        self.authorized(req)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))
    }

    async fn check(resp: Response) -> Result<Response, RemoteError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RemoteError::NotAuthenticated);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Backend {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn toggle_memorized(&self, toggle: &MemorizedToggle) -> Result<(), RemoteError> {
        let url = self.memorized_url(&toggle.word_id)?;
        let req = Self::keyed(self.client.post(url), toggle.request_id).json(&ToggleMemorizedRequest {
            memorized: toggle.memorized,
        });

        let resp = self.send(req).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(RemoteError::StaleReference(toggle.word_id.clone()));
        }
        Self::check(resp).await?;
        debug!(word_id = %toggle.word_id, memorized = toggle.memorized, "toggle sent");
        Ok(())
    }

    async fn save_quiz_result(&self, result: &QuizResultRecord) -> Result<(), RemoteError> {
        let url = self.url("/api/quiz/results");
        let req = Self::keyed(self.client.post(&url), result.request_id).json(result);
        Self::check(self.send(req).await?).await?;
        Ok(())
    }

    async fn save_quiz_progress(&self, progress: &QuizProgressRecord) -> Result<(), RemoteError> {
        let url = self.url("/api/quiz/progress");
        let req = Self::keyed(self.client.put(&url), progress.request_id).json(progress);
        Self::check(self.send(req).await?).await?;
        Ok(())
    }

    async fn clear_quiz_session(&self) -> Result<(), RemoteError> {
        let url = self.url("/api/quiz/session");
        let resp = self.send(self.client.delete(&url)).await?;
        // Nothing to delete is as good as deleted.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(resp).await?;
        Ok(())
    }

    async fn get_offline_snapshot(&self) -> Result<OfflineSnapshot, RemoteError> {
        let url = self.url("/api/offline/snapshot");
        let resp = Self::check(self.send(self.client.get(&url)).await?).await?;
        resp.json()
            .await
            .map_err(|e| RemoteError::Parse(e.to_string()))
    }

    async fn check_connectivity(&self) -> bool {
        let url = self.url("/health");
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }
}

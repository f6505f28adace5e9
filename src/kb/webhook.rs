use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Payload handed to the external knowledge-base processing pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct KbProcessingPayload {
    pub user_id: Uuid,
    pub username: String,
    pub url_id: Uuid,
    pub drive_url: String,
    pub title: String,
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned HTTP {0}")]
    Status(u16),
}

/// Outbound client for the processing webhook. One POST per request, no
/// retries; the endpoint is configuration.
#[derive(Clone)]
pub struct WebhookClient {
    endpoint: String,
    http: reqwest::Client,
}

impl WebhookClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            http: reqwest::Client::new(),
        }
    }

    pub async fn send_for_processing(
        &self,
        payload: &KbProcessingPayload,
    ) -> Result<(), WebhookError> {
        let response = self.http.post(&self.endpoint).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> KbProcessingPayload {
        KbProcessingPayload {
            user_id: Uuid::new_v4(),
            username: "sarah".to_string(),
            url_id: Uuid::new_v4(),
            drive_url: "https://drive.example.com/doc".to_string(),
            title: "Pricing sheet".to_string(),
        }
    }

    #[tokio::test]
    async fn accepted_post_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/webhook/knowledge-base")
            .match_header("content-type", "application/json")
            .with_status(200)
            .create_async()
            .await;

        let client = WebhookClient::new(format!("{}/webhook/knowledge-base", server.url()));
        client.send_for_processing(&payload()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_2xx_response_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/webhook/knowledge-base")
            .with_status(500)
            .create_async()
            .await;

        let client = WebhookClient::new(format!("{}/webhook/knowledge-base", server.url()));
        let err = client.send_for_processing(&payload()).await.unwrap_err();
        match err {
            WebhookError::Status(code) => assert_eq!(code, 500),
            other => panic!("unexpected error: {other}"),
        }
    }
}

// Remote Store - the same Backend surface, spoken over HTTP
//
// Used where the process cannot hold a store handle itself (e.g. a client
// that only talks to the API server). The tenant travels in the
// `x-user-id` header on every request. Routes:
//   POST   {base}/api/stores/{store}/{collection}
//   GET    {base}/api/stores/{store}/{collection}/{id}
//   PATCH  {base}/api/stores/{store}/{collection}/{id}
//   DELETE {base}/api/stores/{store}/{collection}/{id}

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{Backend, TenantId};
use crate::api::{ApiResponse, CreatedResponse, TENANT_HEADER};
use crate::entities::{EntityKind, Fields};
use crate::error::BackendError;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub struct RemoteBackend {
    name: String,
    base_url: String,
    store: String,
    client: Client,
}

impl RemoteBackend {
    pub fn new(base_url: &str, store: &str, timeout_secs: Option<u64>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)))
            .build()?;

        Ok(RemoteBackend {
            name: format!("remote:{}", store),
            base_url: base_url.trim_end_matches('/').to_string(),
            store: store.to_string(),
            client,
        })
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/api/stores/{}/{}", self.base_url, self.store, kind.collection())
    }

    fn record_url(&self, kind: EntityKind, id: &str) -> String {
        format!("{}/{}", self.collection_url(kind), urlencoding::encode(id))
    }
}

/// Map a non-2xx response onto the failure taxonomy
async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let message = match response.json::<ApiResponse<serde_json::Value>>().await {
        Ok(body) => body.error.unwrap_or_else(|| status.to_string()),
        Err(_) => status.to_string(),
    };

    match status {
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => BackendError::Validation(message),
        StatusCode::REQUEST_TIMEOUT
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => BackendError::Connectivity(message),
        _ => BackendError::Unknown(message),
    }
}

async fn read_body<T: DeserializeOwned>(response: Response) -> Result<Option<T>, BackendError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    let body: ApiResponse<T> = response.json().await?;
    if !body.success {
        return Err(BackendError::Unknown(
            body.error.unwrap_or_else(|| "remote store reported failure".to_string()),
        ));
    }
    Ok(body.data)
}

#[async_trait]
impl Backend for RemoteBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        fields: Fields,
    ) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.collection_url(kind))
            .header(TENANT_HEADER, tenant.as_str())
            .json(&fields)
            .send()
            .await?;

        let created: Option<CreatedResponse> = read_body(response).await?;
        created
            .map(|c| c.id)
            .ok_or_else(|| BackendError::Unknown("remote store returned no id".to_string()))
    }

    async fn update(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        id: &str,
        patch: Fields,
    ) -> Result<(), BackendError> {
        let response = self
            .client
            .patch(self.record_url(kind, id))
            .header(TENANT_HEADER, tenant.as_str())
            .json(&patch)
            .send()
            .await?;

        read_body::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, tenant: &TenantId, id: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.record_url(kind, id))
            .header(TENANT_HEADER, tenant.as_str())
            .send()
            .await?;

        read_body::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn get(
        &self,
        kind: EntityKind,
        tenant: &TenantId,
        id: &str,
    ) -> Result<Option<Fields>, BackendError> {
        let response = self
            .client
            .get(self.record_url(kind, id))
            .header(TENANT_HEADER, tenant.as_str())
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_body(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    #[test]
    fn test_urls() {
        let remote = RemoteBackend::new("http://localhost:3000/", "document", None).unwrap();
        assert_eq!(
            remote.collection_url(EntityKind::Goal),
            "http://localhost:3000/api/stores/document/goals"
        );
        assert_eq!(
            remote.record_url(EntityKind::Bet, "abc"),
            "http://localhost:3000/api/stores/document/bets/abc"
        );
        assert_eq!(remote.name(), "remote:document");
    }

    #[test]
    fn test_ids_are_percent_encoded_in_urls() {
        let remote = RemoteBackend::new("http://localhost:3000", "sqlite", None).unwrap();
        assert_eq!(
            remote.record_url(EntityKind::Goal, "a/b?c#d"),
            "http://localhost:3000/api/stores/sqlite/goals/a%2Fb%3Fc%23d"
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_failure() {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let remote = RemoteBackend::new("http://127.0.0.1:9", "sqlite", Some(2)).unwrap();
        let err = remote
            .create(EntityKind::Goal, &TenantId::new("u"), Fields::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Connectivity);
    }
}

use std::time::Duration;

use async_trait::async_trait;
use geo_core::Coordinate;
use reqwest::{Client, Method, Url};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    ActiveRoute, ApiError, BackendApi, RequestedRoute,
    wire::{
        ACCEPT_TASK_PATH, ACTIVE_ROUTE_PATH, AcceptTaskRequest, ActiveRouteRequest,
        ActiveRouteResponse, REQUESTED_ROUTE_PATH, RequestedRouteRequest, RequestedRouteResponse,
        StatusResponse, UPDATE_LOCATION_PATH, UpdateLocationRequest,
    },
};

#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Base URL every endpoint path is appended to.
    pub base_url: String,
    /// Bearer credential of the signed-in user.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// reqwest-backed [`BackendApi`].
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self, ApiError> {
        Url::parse(&config.base_url).map_err(|err| ApiError::InvalidUrl {
            url: config.base_url.clone(),
            reason: err.to_string(),
        })?;

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<B, R>(&self, method: Method, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!("{method} {url}");

        let mut request = self.client.request(method, &url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Error bodies usually still carry the `{success, message}` envelope.
            if let Ok(envelope) = serde_json::from_str::<StatusResponse>(&body) {
                if let Some(message) = envelope.message.or(envelope.error) {
                    return Err(ApiError::Rejected { message });
                }
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<R>().await?)
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn update_location(&self, location: Coordinate) -> Result<(), ApiError> {
        let body = UpdateLocationRequest {
            latitude: location.latitude,
            longitude: location.longitude,
        };
        self.send::<_, StatusResponse>(Method::PUT, UPDATE_LOCATION_PATH, &body)
            .await?
            .into_result()
    }

    async fn active_route(&self, task_id: &str) -> Result<ActiveRoute, ApiError> {
        let body = ActiveRouteRequest { task_id };
        self.send::<_, ActiveRouteResponse>(Method::POST, ACTIVE_ROUTE_PATH, &body)
            .await?
            .into_route()
    }

    async fn requested_route(
        &self,
        task_id: &str,
        worker: Coordinate,
    ) -> Result<RequestedRoute, ApiError> {
        let body = RequestedRouteRequest::new(task_id, worker);
        self.send::<_, RequestedRouteResponse>(Method::POST, REQUESTED_ROUTE_PATH, &body)
            .await?
            .into_route()
    }

    async fn accept_task(&self, task_id: &str, worker: Coordinate) -> Result<(), ApiError> {
        let body = AcceptTaskRequest {
            requested_task_id: task_id,
            worker_location: worker,
        };
        // The accept endpoint answers with the updated task, not the status envelope.
        self.send::<_, serde_json::Value>(Method::PUT, ACCEPT_TASK_PATH, &body)
            .await
            .map(|_| ())
    }
}

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};

use super::error::{ClientError, fault_message};
use super::types::{Microversion, Node, ProvisionStateRequest};

const API_VERSION_HEADER: &str = "X-OpenStack-Ironic-API-Version";

/// Raw calls against the node API. Implemented over HTTP by [`IronicClient`]
/// and by in-memory doubles in tests.
pub trait ProvisionApi: Send + Sync {
    fn get_node(&self, node_id: &str) -> impl Future<Output = Result<Node, ClientError>> + Send;

    fn set_provision_state(
        &self,
        node_id: &str,
        req: &ProvisionStateRequest,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// How requests authenticate against Ironic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    NoAuth,
    HttpBasic { username: String, password: String },
}

pub struct IronicClient {
    client: Client,
    endpoint: String,
    microversion: Microversion,
    auth: Auth,
}

impl IronicClient {
    /// Build a client for `endpoint` (e.g. `http://ironic:6385`).
    pub fn new(endpoint: &str, microversion: Microversion, auth: Auth) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            microversion,
            auth,
        })
    }

    pub fn microversion(&self) -> Microversion {
        self.microversion
    }

    fn node_url(&self, node_id: &str) -> String {
        format!("{}/v1/nodes/{node_id}", self.endpoint)
    }

    fn decorate(&self, req: RequestBuilder) -> RequestBuilder {
        let req = req.header(API_VERSION_HEADER, self.microversion.to_string());
        match &self.auth {
            Auth::NoAuth => req,
            Auth::HttpBasic { username, password } => req.basic_auth(username, Some(password)),
        }
    }
}

async fn rejection(node_id: &str, response: reqwest::Response) -> ClientError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return ClientError::NotFound {
            node: node_id.to_string(),
        };
    }
    if status == StatusCode::CONFLICT {
        return ClientError::Busy { attempts: 1 };
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    ClientError::RequestRejected {
        status: status.as_u16(),
        message: fault_message(&body),
    }
}

impl ProvisionApi for IronicClient {
    async fn get_node(&self, node_id: &str) -> Result<Node, ClientError> {
        let response = self
            .decorate(self.client.get(self.node_url(node_id)))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(node_id, response).await);
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn set_provision_state(
        &self,
        node_id: &str,
        req: &ProvisionStateRequest,
    ) -> Result<(), ClientError> {
        let url = format!("{}/states/provision", self.node_url(node_id));
        let response = self
            .decorate(self.client.put(url))
            .json(req)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(node_id, response).await);
        }
        Ok(())
    }
}

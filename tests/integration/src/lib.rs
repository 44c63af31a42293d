//! Test harness for the end-to-end tests.
//!
//! [`TestEnv`] starts the server in-process on an ephemeral port.
//! [`FlowSession`] drives the executor endpoints as one client session.

use std::time::Duration;

use ak_model::Flow;
use ak_server::{Server, ServerConfig, SESSION_HEADER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A running server and an HTTP client pointed at it.
pub struct TestEnv {
    /// Base URL of the running server.
    pub base_url: String,
    /// HTTP client for testing.
    pub client: Client,
    server: JoinHandle<()>,
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl TestEnv {
    /// Starts a server with the testing configuration and no flows.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(ServerConfig::for_testing()).await
    }

    /// Starts a server with the given configuration.
    pub async fn with_config(config: ServerConfig) -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("ak_server=debug,ak_flows=debug,ak_stages=debug")
            .with_test_writer()
            .try_init();

        let server = Server::new(config)?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let server = tokio::spawn(async move {
            if let Err(e) = server.serve(listener).await {
                tracing::error!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            base_url,
            client,
            server,
        })
    }

    /// Starts a server and saves `flows` through the definition API.
    pub async fn with_flows(flows: impl IntoIterator<Item = Flow>) -> anyhow::Result<Self> {
        let env = Self::new().await?;
        for flow in flows {
            let response = env.put_flow(&flow).await?;
            if !response.status().is_success() {
                anyhow::bail!(
                    "saving flow '{}' failed: {}",
                    flow.slug,
                    response.text().await?
                );
            }
        }
        Ok(env)
    }

    /// Saves a flow definition.
    pub async fn put_flow(&self, flow: &Flow) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .client
            .put(self.url(&format!("/api/v3/flows/instances/{}/", flow.slug)))
            .json(flow)
            .send()
            .await?)
    }

    /// Returns an absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Returns the executor URL for a flow.
    pub fn executor_url(&self, slug: &str) -> String {
        self.url(&format!("/api/v3/flows/executor/{slug}/"))
    }

    /// Starts a new client session.
    pub fn session(&self) -> FlowSession<'_> {
        FlowSession {
            env: self,
            id: uuid::Uuid::now_v7().to_string(),
        }
    }
}

/// One client session against the executor.
pub struct FlowSession<'a> {
    env: &'a TestEnv,
    /// Session id sent in every request.
    pub id: String,
}

impl FlowSession<'_> {
    /// Fetches the current challenge.
    pub async fn get(&self, slug: &str) -> anyhow::Result<Reply> {
        self.get_with(slug, &[]).await
    }

    /// Fetches the current challenge with query parameters.
    pub async fn get_with(&self, slug: &str, query: &[(&str, &str)]) -> anyhow::Result<Reply> {
        let response = self
            .env
            .client
            .get(self.env.executor_url(slug))
            .query(query)
            .header(SESSION_HEADER, &self.id)
            .send()
            .await?;
        Reply::read(response).await
    }

    /// Submits a challenge response.
    pub async fn post(&self, slug: &str, body: Value) -> anyhow::Result<Reply> {
        let response = self
            .env
            .client
            .post(self.env.executor_url(slug))
            .header(SESSION_HEADER, &self.id)
            .json(&body)
            .send()
            .await?;
        Reply::read(response).await
    }

    /// Drops the session's plan.
    pub async fn cancel(&self, slug: &str) -> anyhow::Result<StatusCode> {
        let response = self
            .env
            .client
            .delete(self.env.executor_url(slug))
            .header(SESSION_HEADER, &self.id)
            .send()
            .await?;
        Ok(response.status())
    }
}

/// A decoded executor response.
#[derive(Debug)]
pub struct Reply {
    /// HTTP status.
    pub status: StatusCode,
    /// Session id echoed by the server.
    pub session: Option<String>,
    /// JSON body, `Null` when empty.
    pub body: Value,
}

impl Reply {
    /// Reads status, session header and body.
    pub async fn read(response: reqwest::Response) -> anyhow::Result<Self> {
        let status = response.status();
        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(Self {
            status,
            session,
            body,
        })
    }

    /// Challenge component, or `""` if the body has none.
    pub fn component(&self) -> &str {
        self.body["component"].as_str().unwrap_or_default()
    }

    /// Stamp fields to echo back in a response.
    pub fn stamp(&self) -> (Value, Value) {
        (self.body["plan_id"].clone(), self.body["position"].clone())
    }
}

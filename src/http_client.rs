use crate::error::{ClientError, ClientResult};
use anyhow::{Context, Result, ensure};
use log::debug;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use reqwest::{Client, Response, StatusCode, header::CONTENT_TYPE};
use trait_variant::make;

/// Body of a POST request to the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Serialized JSON document
    Json(String),
    /// Primitive argument sent verbatim (e.g. a new password)
    Text(String),
    /// Parameterless trigger endpoints
    Empty,
}

/// Request/response exchange with the controller.
///
/// A single call is one network exchange. There is no retry and no timeout
/// beyond the underlying client default; callers decide what a failure means.
#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait Transport {
    /// GET `path` and resolve to the response body of a 200 OK response
    async fn get(&self, path: &str) -> ClientResult<String>;

    /// POST `payload` to `path`. Only 200 OK counts as success and the
    /// response body is never read.
    async fn post(&self, path: &str, payload: Payload) -> ClientResult<()>;
}

/// [`Transport`] talking HTTP to the controller at a fixed base url
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the controller reachable at `base_url`
    ///
    /// # Examples
    /// ```no_run
    /// use sci_bat_ui::http_client::HttpTransport;
    ///
    /// let transport = HttpTransport::new("http://10.0.0.2:8080")
    ///     .expect("failed to create transport");
    /// ```
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();

        ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "failed since controller url has no http(s) scheme: {base_url}"
        );

        let client = Client::builder()
            .build()
            .context("failed to create controller HTTP client")?;

        Ok(HttpTransport { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        // Normalize path to always start with a single "/"
        let normalized_path = path.trim_start_matches('/');
        format!("{}/{normalized_path}", self.base_url)
    }
}

/// Map any status but 200 OK into [`ClientError::Status`] and read the body otherwise
pub async fn handle_http_response(res: Response, action: &str) -> ClientResult<String> {
    let status = res.status();

    if status != StatusCode::OK {
        return Err(ClientError::Status {
            action: action.to_string(),
            status: status.as_u16(),
        });
    }

    res.text()
        .await
        .map_err(|e| ClientError::transport(action, e))
}

impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> ClientResult<String> {
        let url = self.build_url(path);
        let action = format!("GET {url}");
        debug!("{action}");

        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::transport(&action, e))?;

        handle_http_response(res, &action).await
    }

    async fn post(&self, path: &str, payload: Payload) -> ClientResult<()> {
        let url = self.build_url(path);
        let action = format!("POST {url}");
        debug!("{action}");

        let request = match payload {
            Payload::Json(body) => self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(body),
            Payload::Text(body) => self
                .client
                .post(&url)
                .header(CONTENT_TYPE, "text/plain")
                .body(body),
            Payload::Empty => self.client.post(&url),
        };

        let res = request
            .send()
            .await
            .map_err(|e| ClientError::transport(&action, e))?;

        let status = res.status();
        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(ClientError::Status {
                action,
                status: status.as_u16(),
            })
        }
    }
}

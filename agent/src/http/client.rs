//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::errors::ZtpError;

/// HTTP client options
#[derive(Debug)]
pub struct HttpClientOptions {
    pub base_url: String,
    pub token: Option<SecretString>,
    pub token_scheme: String,
    pub verify_tls: bool,
    pub timeout: Duration,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            base_url: "https://netbox.example.net/api/dcim".to_string(),
            token: None,
            token_scheme: "Bearer".to_string(),
            verify_tls: true,
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for the inventory service
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<SecretString>,
    token_scheme: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(options: HttpClientOptions) -> Result<Self, ZtpError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify_tls)
            .build()?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            token: options.token,
            token_scheme: options.token_scheme,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(
                header::AUTHORIZATION,
                format!("{} {}", self.token_scheme, token.expose_secret()),
            ),
            None => request,
        }
    }

    /// Make a GET request and decode the JSON body
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ZtpError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let request = self
            .authorize(self.client.get(&url))
            .header(header::ACCEPT, "application/json")
            .query(query);
        let response = check_status("GET", request.send().await?).await?;

        let body = response.json().await?;
        Ok(body)
    }

    /// Make an empty-bodied POST request and return the body as text
    pub async fn post_text(&self, path: &str, query: &[(&str, &str)]) -> Result<String, ZtpError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let request = self.authorize(self.client.post(&url)).query(query);
        let response = check_status("POST", request.send().await?).await?;

        let body = response.text().await?;
        Ok(body)
    }
}

async fn check_status(method: &str, response: Response) -> Result<Response, ZtpError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!("HTTP {} failed: {} - {}", method, status, body);
    Err(ZtpError::Fetch(format!("{}: {}", status, body)))
}

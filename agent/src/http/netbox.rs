//! NetBox device API client

use async_trait::async_trait;
use tracing::debug;

use crate::errors::ZtpError;
use crate::http::client::HttpClient;
use crate::inventory::InventoryApi;
use crate::models::inventory::{DeviceId, DeviceRecord, DeviceSearchResponse};

/// Inventory API backed by NetBox's `dcim` endpoints
pub struct NetboxClient {
    http: HttpClient,
    render_format: String,
}

impl NetboxClient {
    pub fn new(http: HttpClient, render_format: impl Into<String>) -> Self {
        Self {
            http,
            render_format: render_format.into(),
        }
    }
}

#[async_trait]
impl InventoryApi for NetboxClient {
    async fn find_devices_by_serial(&self, serial: &str) -> Result<Vec<DeviceRecord>, ZtpError> {
        let response: DeviceSearchResponse =
            self.http.get("/devices/", &[("serial", serial)]).await?;
        debug!("Serial search returned {} device(s)", response.results.len());
        Ok(response.results)
    }

    async fn render_config(&self, device_id: &DeviceId) -> Result<String, ZtpError> {
        let path = format!("/devices/{}/render-config/", device_id);
        self.http
            .post_text(&path, &[("format", self.render_format.as_str())])
            .await
    }
}

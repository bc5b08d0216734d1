//! HTTP implementation of the send capability.

use std::collections::HashMap;

use tracing::debug;

use hermod_core::error::{HermodError, HermodResult};
use hermod_core::models::message::SendTextRequest;
use hermod_core::sender::TextSender;

/// Delivers text sends to backend instances over HTTP, resolving each
/// instance name through the configured endpoint map.
pub struct HttpTextSender {
    client: reqwest::Client,
    endpoints: HashMap<String, String>,
}

impl HttpTextSender {
    pub fn new(endpoints: HashMap<String, String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }
}

impl TextSender for HttpTextSender {
    async fn send_text(
        &self,
        instance: &str,
        request: &SendTextRequest,
    ) -> HermodResult<serde_json::Value> {
        let base = self.endpoints.get(instance).ok_or_else(|| {
            HermodError::Upstream(format!("no endpoint configured for instance '{instance}'"))
        })?;

        let url = format!("{}/message/sendText", base.trim_end_matches('/'));
        debug!(instance, %url, "forwarding text send");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| HermodError::Upstream(format!("send to '{instance}' failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(HermodError::Upstream(format!(
                "instance '{instance}' returned HTTP {status}: {detail}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| HermodError::Upstream(format!("undecodable send result: {e}")))
    }
}

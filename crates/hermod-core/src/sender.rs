//! Outbound send capability.

use crate::error::HermodResult;
use crate::models::message::SendTextRequest;

/// Capability for delivering a text message through a named backend
/// instance. Errors surface to the caller of the balanced-send API as
/// upstream failures.
pub trait TextSender: Send + Sync {
    fn send_text(
        &self,
        instance: &str,
        request: &SendTextRequest,
    ) -> impl Future<Output = HermodResult<serde_json::Value>> + Send;
}

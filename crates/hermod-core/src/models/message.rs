//! Outbound text message payloads.

use serde::{Deserialize, Serialize};

use crate::error::{HermodError, HermodResult};

/// Payload handed to the [`TextSender`](crate::sender::TextSender)
/// capability for one backend instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextRequest {
    /// Destination contact: digits followed by an optional suffix such
    /// as a server qualifier.
    pub number: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
    #[serde(rename = "mentionsEveryOne", skip_serializing_if = "Option::is_none")]
    pub mentions_everyone: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentioned: Option<Vec<String>>,
}

/// Balanced send request: a [`SendTextRequest`] routed through a group
/// alias instead of a fixed instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancedSendRequest {
    pub alias: String,
    #[serde(flatten)]
    pub message: SendTextRequest,
}

/// Validate a destination number: one or more digits followed by at
/// least one character from `[.@\w-]`.
pub fn validate_number(number: &str) -> HermodResult<()> {
    let digits = number.chars().take_while(|c| c.is_ascii_digit()).count();
    let rest = &number[digits..];
    // A trailing suffix may be empty only when a digit can stand in for
    // it, i.e. the number is at least two digits long.
    let ok = if rest.is_empty() {
        digits >= 2
    } else {
        digits >= 1
            && rest
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '@' | '_' | '-'))
    };
    if !ok {
        return Err(HermodError::validation(format!(
            "invalid destination number: {number}"
        )));
    }
    Ok(())
}

/// Validate a balanced send request body.
pub fn validate_balanced_send(request: &BalancedSendRequest) -> HermodResult<()> {
    if request.alias.is_empty() {
        return Err(HermodError::validation("alias must not be empty"));
    }
    validate_number(&request.message.number)?;
    if request.message.text.is_empty() {
        return Err(HermodError::validation("text must not be empty"));
    }
    if let Some(mentioned) = &request.message.mentioned {
        for number in mentioned {
            validate_number(number)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_pattern() {
        assert!(validate_number("5511999999999@s.net").is_ok());
        assert!(validate_number("551199999999-group").is_ok());
        assert!(validate_number("5511999999991").is_ok());
        assert!(validate_number("5").is_err());
        assert!(validate_number("abc123").is_err());
        assert!(validate_number("").is_err());
        assert!(validate_number("123 456").is_err());
    }

    #[test]
    fn balanced_send_requires_alias_and_text() {
        let request = BalancedSendRequest {
            alias: "".into(),
            message: SendTextRequest {
                number: "5511999999991".into(),
                text: "hi".into(),
                delay: None,
                quoted: None,
                link_preview: None,
                mentions_everyone: None,
                mentioned: None,
            },
        };
        assert!(validate_balanced_send(&request).is_err());

        let request = BalancedSendRequest {
            alias: "sales".into(),
            message: SendTextRequest {
                text: "".into(),
                ..request.message
            },
        };
        assert!(validate_balanced_send(&request).is_err());
    }
}

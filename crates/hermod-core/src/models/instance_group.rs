//! Instance group domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HermodError, HermodResult};

/// A named pool of backend instances used for balanced sends.
///
/// The `alias` is the URL-safe routing key; `instances` is an ordered,
/// duplicate-free set of backend instance names with at least one member.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceGroup {
    pub id: Uuid,
    pub name: String,
    pub alias: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub instances: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstanceGroup {
    pub name: String,
    /// Omitted or empty aliases are derived from the name via
    /// [`transform_to_alias`].
    #[serde(default)]
    pub alias: String,
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub instances: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateInstanceGroup {
    pub name: Option<String>,
    pub alias: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub instances: Option<Vec<String>>,
}

/// Normalize an arbitrary label into an alias: lowercase, spaces and
/// underscores become hyphens, anything outside `[a-z0-9-]` is dropped,
/// hyphen runs collapse, leading/trailing hyphens are trimmed.
///
/// The transform is idempotent.
pub fn transform_to_alias(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_hyphen = true; // suppress leading hyphens
    for ch in input.chars() {
        let mapped = match ch {
            'A'..='Z' => Some(ch.to_ascii_lowercase()),
            'a'..='z' | '0'..='9' => Some(ch),
            ' ' | '_' | '-' => Some('-'),
            _ => None,
        };
        match mapped {
            Some('-') => {
                if !last_hyphen {
                    out.push('-');
                    last_hyphen = true;
                }
            }
            Some(c) => {
                out.push(c);
                last_hyphen = false;
            }
            None => {}
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Validate a group name: 1–100 characters.
pub fn validate_name(name: &str) -> HermodResult<()> {
    if name.is_empty() || name.chars().count() > 100 {
        return Err(HermodError::validation(
            "group name must be between 1 and 100 characters",
        ));
    }
    Ok(())
}

/// Validate an alias: 1–100 characters matching `[a-z0-9-]+`.
pub fn validate_alias(alias: &str) -> HermodResult<()> {
    if alias.is_empty() || alias.len() > 100 {
        return Err(HermodError::validation(
            "alias must be between 1 and 100 characters",
        ));
    }
    if !alias
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(HermodError::validation(
            "alias may only contain lowercase letters, digits and hyphens",
        ));
    }
    Ok(())
}

/// Validate an optional description: at most 500 characters.
pub fn validate_description(description: Option<&str>) -> HermodResult<()> {
    if let Some(text) = description
        && text.chars().count() > 500
    {
        return Err(HermodError::validation(
            "description must be at most 500 characters",
        ));
    }
    Ok(())
}

/// Validate a membership list: non-empty and duplicate-free.
pub fn validate_instances(instances: &[String]) -> HermodResult<()> {
    if instances.is_empty() {
        return Err(HermodError::validation(
            "group must contain at least one instance",
        ));
    }
    let mut seen = std::collections::HashSet::new();
    for name in instances {
        if name.is_empty() {
            return Err(HermodError::validation("instance name must not be empty"));
        }
        if !seen.insert(name.as_str()) {
            return Err(HermodError::validation(format!(
                "duplicate instance in group: {name}"
            )));
        }
    }
    Ok(())
}

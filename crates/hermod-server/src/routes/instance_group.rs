//! Instance-group management endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use surrealdb::Connection;

use hermod_core::error::HermodError;
use hermod_core::models::instance_group::{
    self, CreateInstanceGroup, InstanceGroup, UpdateInstanceGroup,
};
use hermod_core::registry::{ConnectionState, InstanceRegistry};
use hermod_core::repository::GroupRepository;
use hermod_core::sender::TextSender;

use crate::error::ApiResult;
use crate::routes::parse_id;
use crate::state::AppState;

fn validate_create(input: &CreateInstanceGroup) -> ApiResult<()> {
    instance_group::validate_name(&input.name)?;
    instance_group::validate_alias(&input.alias)?;
    instance_group::validate_description(input.description.as_deref())?;
    instance_group::validate_instances(&input.instances)?;
    Ok(())
}

fn validate_update(input: &UpdateInstanceGroup) -> ApiResult<()> {
    if let Some(name) = &input.name {
        instance_group::validate_name(name)?;
    }
    if let Some(alias) = &input.alias {
        instance_group::validate_alias(alias)?;
    }
    instance_group::validate_description(input.description.as_deref())?;
    if let Some(instances) = &input.instances {
        instance_group::validate_instances(instances)?;
    }
    Ok(())
}

/// Every member must exist in the registry's backing store.
fn require_known_instances<R: InstanceRegistry>(registry: &R, instances: &[String]) -> ApiResult<()> {
    for name in instances {
        if !registry.is_known(name) {
            return Err(HermodError::validation(format!(
                "instance '{name}' does not exist"
            ))
            .into());
        }
    }
    Ok(())
}

pub async fn create<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    body: Result<Json<CreateInstanceGroup>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(mut input) = body?;
    if input.alias.is_empty() {
        input.alias = instance_group::transform_to_alias(&input.name);
    }
    validate_create(&input)?;
    require_known_instances(state.registry.as_ref(), &input.instances)?;

    let group = state.groups.create(input).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn list<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
) -> ApiResult<Json<Vec<InstanceGroup>>> {
    Ok(Json(state.groups.list().await?))
}

pub async fn get_by_id<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<InstanceGroup>> {
    let id = parse_id(&id)?;
    Ok(Json(state.groups.get_by_id(id).await?))
}

pub async fn get_by_name<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(name): Path<String>,
) -> ApiResult<Json<InstanceGroup>> {
    Ok(Json(state.groups.get_by_name(&name).await?))
}

pub async fn get_by_alias<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(alias): Path<String>,
) -> ApiResult<Json<InstanceGroup>> {
    Ok(Json(state.groups.get_by_alias(&alias).await?))
}

pub async fn update<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateInstanceGroup>, JsonRejection>,
) -> ApiResult<Json<InstanceGroup>> {
    let id = parse_id(&id)?;
    let Json(input) = body?;
    validate_update(&input)?;
    if let Some(instances) = &input.instances {
        require_known_instances(state.registry.as_ref(), instances)?;
    }

    Ok(Json(state.groups.update(id, input).await?))
}

pub async fn remove<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    state.groups.delete(id).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberChange {
    pub instance_name: String,
}

pub async fn add_instance<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
    body: Result<Json<MemberChange>, JsonRejection>,
) -> ApiResult<Json<InstanceGroup>> {
    let id = parse_id(&id)?;
    let Json(change) = body?;
    if change.instance_name.is_empty() {
        return Err(HermodError::validation("instanceName must not be empty").into());
    }
    if !state.registry.is_known(&change.instance_name) {
        return Err(HermodError::validation(format!(
            "instance '{}' does not exist",
            change.instance_name
        ))
        .into());
    }

    Ok(Json(state.groups.add_instance(id, &change.instance_name).await?))
}

pub async fn remove_instance<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
    body: Result<Json<MemberChange>, JsonRejection>,
) -> ApiResult<Json<InstanceGroup>> {
    let id = parse_id(&id)?;
    let Json(change) = body?;
    Ok(Json(
        state
            .groups
            .remove_instance(id, &change.instance_name)
            .await?,
    ))
}

pub async fn active_instances<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    let group = state.groups.get_by_id(id).await?;

    let active: Vec<&String> = group
        .instances
        .iter()
        .filter(|name| state.registry.connection_state(name) == ConnectionState::Open)
        .collect();

    Ok(Json(json!({
        "groupId": group.id,
        "alias": group.alias,
        "instances": active,
        "count": active.len(),
    })))
}

pub async fn stats<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    let group = state.groups.get_by_id(id).await?;

    let members: Vec<serde_json::Value> = group
        .instances
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "state": state.registry.connection_state(name),
            })
        })
        .collect();
    let active = group
        .instances
        .iter()
        .filter(|name| state.registry.connection_state(name) == ConnectionState::Open)
        .count();

    Ok(Json(json!({
        "groupId": group.id,
        "alias": group.alias,
        "enabled": group.enabled,
        "totalInstances": group.instances.len(),
        "activeInstances": active,
        "inactiveInstances": group.instances.len() - active,
        "instances": members,
    })))
}

//! Balanced message send endpoint.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use serde_json::json;
use surrealdb::Connection;
use tracing::debug;

use hermod_core::events::EventKind;
use hermod_core::models::message::{self, BalancedSendRequest};
use hermod_core::sender::TextSender;

use crate::error::ApiResult;
use crate::state::AppState;

/// Route a text send through the group named by `alias`: pick an
/// instance, forward the message, and report which instance handled it
/// along with the rotation snapshot.
pub async fn send_text_with_group_balancing<C: Connection, S: TextSender>(
    State(state): State<AppState<C, S>>,
    body: Result<Json<BalancedSendRequest>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(request) = body?;
    message::validate_balanced_send(&request)?;

    let selection = state
        .balancer
        .select_for_contact_in_group(&request.alias, &request.message.number)
        .await?;

    debug!(
        alias = %request.alias,
        instance = %selection.instance,
        contact = %selection.contact,
        "balanced send routed"
    );

    let result = state
        .sender
        .send_text(&selection.instance, &request.message)
        .await?;

    // Successful sends are announced to webhook subscribers without
    // blocking the response.
    let dispatcher = state.dispatcher.clone();
    let event_payload = json!({
        "number": request.message.number,
        "text": request.message.text,
        "result": result,
    });
    let instance_used = selection.instance.clone();
    tokio::spawn(async move {
        dispatcher
            .dispatch(EventKind::SendMessage, event_payload, Some(instance_used))
            .await;
    });

    let mut response = match result {
        serde_json::Value::Object(map) => serde_json::Value::Object(map),
        other => json!({ "result": other }),
    };
    if let Some(map) = response.as_object_mut() {
        map.insert("instanceUsed".into(), json!(selection.instance));
        map.insert("groupId".into(), json!(selection.group_id));
        map.insert("groupAlias".into(), json!(request.alias));
        map.insert(
            "balancingInfo".into(),
            json!({
                "contact": selection.contact,
                "groupId": selection.group_id,
                "lastUsedInstance": selection.instance,
                "usedInstancesInCycle": selection.used_instances_in_cycle,
                "rotationCount": selection.rotation_count,
                "globalLastUsedInstance": selection.global_last_used_instance,
                "globalRotationCount": selection.global_rotation_count,
            }),
        );
    }

    Ok(Json(response))
}

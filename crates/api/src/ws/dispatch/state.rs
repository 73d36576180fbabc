//! CREATE / DELETE / UPDATE / MOVE / CREATE_OR_UPDATE / PUT.

use canopy_core::error::CoreError;
use canopy_core::history::AppModifyHistory;
use canopy_core::signal::{Feedback, InboundMessage, Signal, Target};
use canopy_core::state_type::{StateFamily, StateType};
use canopy_state::payload::{
    component_from_payload, display_name_from_payload, history_target_name, set_value_from_payload,
    KvEntry, SetUpdate,
};
use canopy_state::{EditContext, StateError, StateResult, StateServices};
use serde_json::Value;

use crate::ws::hub::Hub;

impl Hub {
    /// Apply each payload element in order, stopping at the first failure.
    ///
    /// Whatever was persisted before a failure is recorded in the modify
    /// history and relayed to peers; the failure itself goes to the sender
    /// only.
    pub(super) async fn handle_state_mutation(&mut self, message: InboundMessage) {
        let Some(ctx) = self.edit_context(&message) else {
            return;
        };
        let signal = message.signal;

        let Some(state_type) = message.target.state_type() else {
            match message.target {
                // Mutated over HTTP; peers only need to refresh.
                Target::Apps | Target::Resource | Target::Action => {
                    if let Some(feedback) = message.remote_feedback() {
                        self.broadcast_to_other_clients(ctx.app_id, &message.client_id, &feedback);
                    }
                }
                _ => self.send_to_client(
                    &message.client_id,
                    &Feedback::error(
                        signal.failure_code(),
                        format!("Target {:?} cannot be changed with {signal:?}", message.target),
                    ),
                ),
            }
            return;
        };

        let mut records = Vec::with_capacity(message.payload.len());
        let mut failure = None;
        for element in &message.payload {
            match apply_element(&self.services, &ctx, signal, state_type, element).await {
                Ok(name) => records.push(AppModifyHistory::new(
                    signal.code(),
                    message.target.code(),
                    name,
                    ctx.user_id,
                )),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let applied = records.len();
        if applied > 0 {
            if let Err(e) = self.services.snapshots.record_modify_history(&ctx, records).await {
                tracing::error!(app_id = ctx.app_id, error = %e, "Failed to record modify history");
            }
            if let Err(e) = self.services.apps.touch(ctx.app_id, ctx.user_id).await {
                tracing::warn!(app_id = ctx.app_id, error = %e, "Failed to touch app");
            }
            let feedback = if failure.is_some() {
                message.remote_feedback_prefix(applied)
            } else {
                message.remote_feedback()
            };
            if let Some(feedback) = feedback {
                self.broadcast_to_other_clients(ctx.app_id, &message.client_id, &feedback);
            }
        }

        if let Some(err) = failure {
            tracing::debug!(
                app_id = ctx.app_id,
                signal = ?signal,
                target = ?message.target,
                applied,
                error = %err,
                "State mutation failed"
            );
            self.send_to_client(
                &message.client_id,
                &Feedback::error(signal.failure_code(), failure_message(&err)),
            );
        }
    }
}

/// Persist one payload element. Returns the name recorded in the history.
pub(crate) async fn apply_element(
    services: &StateServices,
    ctx: &EditContext,
    signal: Signal,
    state_type: StateType,
    element: &Value,
) -> StateResult<String> {
    match state_type.family() {
        StateFamily::Tree => apply_tree(services, ctx, signal, state_type, element).await?,
        StateFamily::KeyValue => apply_kv(services, ctx, signal, state_type, element).await?,
        StateFamily::Set => apply_set(services, ctx, signal, state_type, element).await?,
    }
    Ok(history_target_name(element))
}

async fn apply_tree(
    services: &StateServices,
    ctx: &EditContext,
    signal: Signal,
    state_type: StateType,
    element: &Value,
) -> StateResult<()> {
    let tree = &services.tree;
    if signal == Signal::DeleteState {
        let name = display_name_from_payload(element).ok_or_else(|| {
            CoreError::Validation("Delete payload requires a displayName".into())
        })?;
        tree.delete_tree_state_node_recursive(ctx, state_type, &name).await?;
        return Ok(());
    }

    let node = component_from_payload(element)?;
    match signal {
        Signal::CreateState => {
            tree.create_component_tree_by_parent_name(ctx, state_type, &node).await?;
        }
        Signal::UpdateState => tree.update_tree_state(ctx, state_type, &node).await?,
        Signal::MoveState => tree.move_tree_state_node(ctx, state_type, &node).await?,
        Signal::CreateOrUpdateState => tree.create_or_update(ctx, state_type, &node).await?,
        Signal::PutState => {
            tree.put(ctx, state_type, &node).await?;
        }
        other => return Err(unsupported(other, state_type)),
    }
    Ok(())
}

async fn apply_kv(
    services: &StateServices,
    ctx: &EditContext,
    signal: Signal,
    state_type: StateType,
    element: &Value,
) -> StateResult<()> {
    let kv = &services.kv;
    if signal == Signal::DeleteState {
        let key = match element {
            Value::String(key) => Some(key.as_str()),
            other => other.get("key").and_then(Value::as_str),
        }
        .ok_or_else(|| CoreError::Validation("Delete payload requires a 'key'".into()))?;
        kv.delete_by_key(ctx, state_type, key).await?;
        return Ok(());
    }

    let entry = KvEntry::from_payload(element)?;
    match signal {
        Signal::CreateState => {
            kv.create(ctx, state_type, &entry).await?;
        }
        // Elements carrying a row id may rename the key as well.
        Signal::UpdateState => match element.get("id").and_then(Value::as_i64) {
            Some(id) => {
                kv.update_by_id(ctx, id, &entry).await?;
            }
            None => {
                kv.update_by_key(ctx, state_type, &entry).await?;
            }
        },
        Signal::CreateOrUpdateState | Signal::PutState => {
            kv.create_or_update(ctx, state_type, &entry).await?;
        }
        other => return Err(unsupported(other, state_type)),
    }
    Ok(())
}

async fn apply_set(
    services: &StateServices,
    ctx: &EditContext,
    signal: Signal,
    state_type: StateType,
    element: &Value,
) -> StateResult<()> {
    let set = &services.set;
    match signal {
        Signal::CreateState => {
            set.create(ctx, state_type, &set_value_from_payload(element)?).await?;
        }
        Signal::DeleteState => {
            set.delete_by_value(ctx, state_type, &set_value_from_payload(element)?)
                .await?;
        }
        Signal::UpdateState => {
            set.update_by_value(ctx, state_type, &SetUpdate::from_payload(element)?)
                .await?;
        }
        Signal::CreateOrUpdateState | Signal::PutState => {
            set.create_or_update(ctx, state_type, &set_value_from_payload(element)?)
                .await?;
        }
        other => return Err(unsupported(other, state_type)),
    }
    Ok(())
}

fn unsupported(signal: Signal, state_type: StateType) -> StateError {
    CoreError::Validation(format!("{signal:?} is not supported for {state_type:?}")).into()
}

/// Message shown to the sender. Storage details stay in the server log.
pub(crate) fn failure_message(err: &StateError) -> String {
    match err {
        StateError::Core(CoreError::Internal(_)) | StateError::Database(_) => {
            tracing::error!(error = %err, "Storage failure while applying a signal");
            "Internal storage error".to_string()
        }
        StateError::Serialization(_) => "Payload could not be stored".to_string(),
        other => other.to_string(),
    }
}

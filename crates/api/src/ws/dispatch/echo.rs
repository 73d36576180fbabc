//! ECHO: generate components from a demand and add them to the tree.
//!
//! Generation can take a long time, so it runs on its own task and reports
//! back through the hub handle instead of blocking the loop.

use std::sync::Arc;

use canopy_core::component::{ComponentNode, SUMMIT_DISPLAY_NAME};
use canopy_core::history::AppModifyHistory;
use canopy_core::signal::{broadcast_types, error_codes, Broadcast, Feedback, InboundMessage, Signal, Target};
use canopy_core::state_type::StateType;
use canopy_state::{EditContext, StateServices};
use serde_json::json;

use super::state::failure_message;
use crate::echo::{EchoError, EchoGenerator, EchoRequest};
use crate::ws::hub::{Audience, Delivery, Hub, HubHandle};

impl Hub {
    pub(super) fn handle_echo(&mut self, message: InboundMessage) {
        let Some(ctx) = self.edit_context(&message) else {
            return;
        };
        let request = self
            .echo
            .clone()
            .ok_or(EchoError::Disabled)
            .and_then(|generator| {
                let element = message.payload.first().cloned().unwrap_or_default();
                EchoRequest::from_payload(ctx.app_id, &element).map(|r| (generator, r))
            });
        let (generator, request) = match request {
            Ok(pair) => pair,
            Err(e) => {
                self.send_to_client(
                    &message.client_id,
                    &Feedback::error(error_codes::ECHO_FAILED, e.to_string()),
                );
                return;
            }
        };

        tokio::spawn(run_echo(
            generator,
            request,
            self.services.clone(),
            ctx,
            message.client_id,
            self.handle.clone(),
        ));
    }
}

async fn run_echo(
    generator: Arc<dyn EchoGenerator>,
    request: EchoRequest,
    services: StateServices,
    ctx: EditContext,
    origin: String,
    hub: HubHandle,
) {
    let reply = |feedback: Feedback| {
        let _ = hub.broadcast(Delivery {
            audience: Audience::Client(origin.clone()),
            feedback,
        });
    };

    let components = match generator.generate(&request).await {
        Ok(components) => components,
        Err(e) => {
            tracing::warn!(app_id = ctx.app_id, error = %e, "Echo generation failed");
            reply(Feedback::error(error_codes::ECHO_FAILED, e.to_string()));
            return;
        }
    };

    let mut created: Vec<ComponentNode> = Vec::with_capacity(components.len());
    let mut failure = None;
    for mut node in components {
        if node.parent_node.is_empty() {
            node.parent_node = SUMMIT_DISPLAY_NAME.to_string();
        }
        match services
            .tree
            .create_component_tree_by_parent_name(&ctx, StateType::Components, &node)
            .await
        {
            Ok(_) => created.push(node),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    if !created.is_empty() {
        let records = created
            .iter()
            .map(|node| {
                AppModifyHistory::new(
                    Signal::Echo.code(),
                    Target::Components.code(),
                    node.display_name.clone(),
                    ctx.user_id,
                )
            })
            .collect();
        if let Err(e) = services.snapshots.record_modify_history(&ctx, records).await {
            tracing::error!(app_id = ctx.app_id, error = %e, "Failed to record modify history");
        }
        if let Err(e) = services.apps.touch(ctx.app_id, ctx.user_id).await {
            tracing::warn!(app_id = ctx.app_id, error = %e, "Failed to touch app");
        }
        // The sender has not applied these either, so the whole room gets them.
        let _ = hub.notify_room(
            ctx.app_id,
            Broadcast::new(broadcast_types::ADD_COMPONENT, json!(created)).into_remote(),
        );
    }

    match failure {
        Some(e) => reply(Feedback::error(error_codes::ECHO_FAILED, failure_message(&e))),
        None => reply(Feedback::ok(json!({ "created": created.len() }))),
    }
}

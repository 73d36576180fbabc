//! Realtime wire protocol: signals, targets, and frame envelopes.
//!
//! Inbound text frames are JSON objects
//! `{signal, option, target, payload, broadcast}`. Outbound frames are
//! [`Feedback`] objects `{errorCode, errorMessage, broadcast, data}`. Signal
//! and target values travel as integer codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::state_type::StateType;
use crate::types::DbId;

/// Suffix appended to a broadcast type when it is forwarded to peers.
pub const REMOTE_SUFFIX: &str = "/remote";

/// Broadcast types emitted by the server itself.
pub mod broadcast_types {
    pub const ENTER: &str = "enter";
    pub const LEAVE: &str = "leave";
    pub const ATTACH_COMPONENT: &str = "attachComponent";
    pub const TAKE_SNAPSHOT: &str = "appInfo/takeSnapshot";
    pub const RECOVER_SNAPSHOT: &str = "appInfo/recoverSnapshot";
    pub const DEPLOY: &str = "appInfo/deploy";
    pub const ADD_COMPONENT: &str = "components/addComponentReducer";
}

/// Feedback error codes. The client distinguishes peer broadcasts from
/// command acknowledgements by these values.
pub mod error_codes {
    pub const OK: i32 = 0;
    pub const ENTER_FAILED: i32 = 2;
    pub const LOGIN_FAILED: i32 = 3;
    pub const FORBIDDEN: i32 = 4;
    pub const INVALID_FRAME: i32 = 5;
    pub const CREATE_STATE_FAILED: i32 = 10;
    pub const DELETE_STATE_FAILED: i32 = 11;
    pub const UPDATE_STATE_FAILED: i32 = 12;
    pub const MOVE_STATE_FAILED: i32 = 13;
    pub const CREATE_OR_UPDATE_STATE_FAILED: i32 = 14;
    pub const PUT_STATE_FAILED: i32 = 15;
    pub const ATTACH_FAILED: i32 = 16;
    pub const TAKE_SNAPSHOT_FAILED: i32 = 17;
    pub const RECOVER_SNAPSHOT_FAILED: i32 = 18;
    pub const ECHO_FAILED: i32 = 19;
    pub const BROADCAST: i32 = 20;
}

macro_rules! define_code_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "i32", into = "i32")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the wire code.
            pub fn code(self) -> i32 {
                self as i32
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                value as i32
            }
        }

        impl TryFrom<i32> for $name {
            type Error = CoreError;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                match value {
                    $( $val => Ok($name::$variant), )+
                    other => Err(CoreError::Validation(format!(
                        concat!("Unknown ", stringify!($name), " code {}"),
                        other
                    ))),
                }
            }
        }
    };
}

define_code_enum! {
    /// Operation requested by an inbound frame.
    Signal {
        Ping = 0,
        Enter = 1,
        Leave = 2,
        CreateState = 3,
        DeleteState = 4,
        UpdateState = 5,
        MoveState = 6,
        CreateOrUpdateState = 7,
        BroadcastOnly = 8,
        PutState = 9,
        GlobalBroadcastOnly = 10,
        CooperateAttach = 11,
        CooperateDisattach = 12,
        TakeAppSnapshot = 13,
        RecoverAppSnapshot = 14,
        Echo = 15,
    }
}

define_code_enum! {
    /// State family an inbound frame acts on.
    Target {
        Nothing = 0,
        Components = 1,
        Dependencies = 2,
        DragShadow = 3,
        DottedLineSquare = 4,
        DisplayName = 5,
        Apps = 6,
        Resource = 7,
        Action = 8,
    }
}

impl Signal {
    /// Returns `true` for signals that persist state changes.
    pub fn is_state_mutation(self) -> bool {
        matches!(
            self,
            Signal::CreateState
                | Signal::DeleteState
                | Signal::UpdateState
                | Signal::MoveState
                | Signal::CreateOrUpdateState
                | Signal::PutState
        )
    }

    /// Returns `true` for signals accepted before the client has entered.
    pub fn allowed_before_enter(self) -> bool {
        matches!(self, Signal::Ping | Signal::Enter | Signal::Leave)
    }

    /// The feedback code reported when this signal fails.
    pub fn failure_code(self) -> i32 {
        match self {
            Signal::Enter => error_codes::ENTER_FAILED,
            Signal::CreateState => error_codes::CREATE_STATE_FAILED,
            Signal::DeleteState => error_codes::DELETE_STATE_FAILED,
            Signal::UpdateState => error_codes::UPDATE_STATE_FAILED,
            Signal::MoveState => error_codes::MOVE_STATE_FAILED,
            Signal::CreateOrUpdateState => error_codes::CREATE_OR_UPDATE_STATE_FAILED,
            Signal::PutState => error_codes::PUT_STATE_FAILED,
            Signal::CooperateAttach | Signal::CooperateDisattach => error_codes::ATTACH_FAILED,
            Signal::TakeAppSnapshot => error_codes::TAKE_SNAPSHOT_FAILED,
            Signal::RecoverAppSnapshot => error_codes::RECOVER_SNAPSHOT_FAILED,
            Signal::Echo => error_codes::ECHO_FAILED,
            Signal::Ping
            | Signal::Leave
            | Signal::BroadcastOnly
            | Signal::GlobalBroadcastOnly => error_codes::INVALID_FRAME,
        }
    }
}

impl Target {
    /// The persisted state type behind this target, if it has one.
    ///
    /// `Apps`, `Resource`, and `Action` are mutated over HTTP; realtime
    /// frames for them only notify peers.
    pub fn state_type(self) -> Option<StateType> {
        match self {
            Target::Components => Some(StateType::Components),
            Target::Dependencies => Some(StateType::Dependencies),
            Target::DragShadow => Some(StateType::DragShadow),
            Target::DottedLineSquare => Some(StateType::DottedLineSquare),
            Target::DisplayName => Some(StateType::DisplayName),
            Target::Nothing | Target::Apps | Target::Resource | Target::Action => None,
        }
    }
}

/// The `broadcast` envelope carried on inbound and outbound frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    #[serde(rename = "type")]
    pub broadcast_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl Broadcast {
    pub fn new(broadcast_type: impl Into<String>, payload: Value) -> Self {
        Self {
            broadcast_type: broadcast_type.into(),
            payload,
        }
    }

    /// Rewrite the type for delivery to peers (`<type>/remote`).
    ///
    /// Already-remote types are left unchanged.
    pub fn into_remote(mut self) -> Self {
        if !self.broadcast_type.ends_with(REMOTE_SUFFIX) {
            self.broadcast_type.push_str(REMOTE_SUFFIX);
        }
        self
    }
}

/// A parsed inbound text frame, stamped with its origin by the read pump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub signal: Signal,
    #[serde(default)]
    pub option: i32,
    #[serde(default = "default_target")]
    pub target: Target,
    #[serde(default, deserialize_with = "payload_list")]
    pub payload: Vec<Value>,
    #[serde(default)]
    pub broadcast: Option<Broadcast>,
    /// Connection id of the sender. Set by the server, never read from JSON.
    #[serde(skip)]
    pub client_id: String,
    /// Room the sender is connected to. Set by the server.
    #[serde(skip)]
    pub app_id: DbId,
}

fn default_target() -> Target {
    Target::Nothing
}

/// Accept `payload` as a list, a single value, or null.
fn payload_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    })
}

impl InboundMessage {
    /// Parse a text frame and stamp it with its origin.
    pub fn parse(text: &str, client_id: &str, app_id: DbId) -> Result<Self, serde_json::Error> {
        let mut message: InboundMessage = serde_json::from_str(text)?;
        message.client_id = client_id.to_string();
        message.app_id = app_id;
        Ok(message)
    }

    /// The frame peers receive: the broadcast envelope rewritten as remote.
    ///
    /// Returns `None` when the sender attached no broadcast envelope.
    pub fn remote_feedback(&self) -> Option<Feedback> {
        self.broadcast
            .clone()
            .map(|b| Feedback::broadcast(b.into_remote()))
    }

    /// Like [`remote_feedback`](Self::remote_feedback) but with the broadcast
    /// payload narrowed to the first `applied` payload elements.
    ///
    /// Used when a multi-element frame fails part way through, so peers only
    /// replay what was persisted.
    pub fn remote_feedback_prefix(&self, applied: usize) -> Option<Feedback> {
        let mut broadcast = self.broadcast.clone()?;
        if let Value::Array(items) = &mut broadcast.payload {
            items.truncate(applied);
        }
        Some(Feedback::broadcast(broadcast.into_remote()))
    }
}

/// An outbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub error_code: i32,
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<Broadcast>,
    #[serde(default)]
    pub data: Value,
}

impl Feedback {
    /// A successful command acknowledgement.
    pub fn ok(data: Value) -> Self {
        Self {
            error_code: error_codes::OK,
            error_message: String::new(),
            broadcast: None,
            data,
        }
    }

    /// A failed command acknowledgement.
    pub fn error(error_code: i32, message: impl Into<String>) -> Self {
        Self {
            error_code,
            error_message: message.into(),
            broadcast: None,
            data: Value::Null,
        }
    }

    /// A peer broadcast.
    pub fn broadcast(broadcast: Broadcast) -> Self {
        Self {
            error_code: error_codes::BROADCAST,
            error_message: String::new(),
            broadcast: Some(broadcast),
            data: Value::Null,
        }
    }

    /// Serialize to the JSON text sent on the socket.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"errorCode":{},"errorMessage":"feedback serialization failed: {}","data":null}}"#,
                error_codes::INVALID_FRAME,
                e.to_string().replace('"', "'")
            )
        })
    }
}

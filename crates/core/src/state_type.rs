//! State-type tags for the persisted state families.
//!
//! Every tree, key-value, and set row carries one of these tags in its
//! `state_type` SMALLINT column. The discriminants are part of the stored
//! data and must never be renumbered.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// SMALLINT representation of a state type in the database.
pub type StateTypeId = i16;

/// Which storage family a state type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFamily {
    /// Rows in `tree_states`, linked by parent/children ids.
    Tree,
    /// Rows in `kv_states`, unique per key.
    KeyValue,
    /// Rows in `set_states`, unique per value.
    Set,
}

/// A typed tag selecting one collection inside a state family.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum StateType {
    /// The component tree.
    Components = 1,
    /// Component dependency graph entries.
    Dependencies = 2,
    /// Drag shadows drawn while a peer drags a component.
    DragShadow = 3,
    /// Dotted-line hover squares.
    DottedLineSquare = 4,
    /// The set of display names in use.
    DisplayName = 5,
}

impl StateType {
    /// All state types, in discriminant order.
    pub const ALL: [StateType; 5] = [
        StateType::Components,
        StateType::Dependencies,
        StateType::DragShadow,
        StateType::DottedLineSquare,
        StateType::DisplayName,
    ];

    /// Return the database id.
    pub fn id(self) -> StateTypeId {
        self as StateTypeId
    }

    /// The storage family this type is persisted in.
    pub fn family(self) -> StateFamily {
        match self {
            StateType::Components => StateFamily::Tree,
            StateType::Dependencies | StateType::DragShadow | StateType::DottedLineSquare => {
                StateFamily::KeyValue
            }
            StateType::DisplayName => StateFamily::Set,
        }
    }

    /// Key used for this collection in the full-app export document.
    pub fn export_key(self) -> &'static str {
        match self {
            StateType::Components => "components",
            StateType::Dependencies => "dependenciesState",
            StateType::DragShadow => "dragShadowState",
            StateType::DottedLineSquare => "dottedLineSquareState",
            StateType::DisplayName => "displayNameState",
        }
    }
}

impl From<StateType> for StateTypeId {
    fn from(value: StateType) -> Self {
        value as StateTypeId
    }
}

impl TryFrom<StateTypeId> for StateType {
    type Error = CoreError;

    fn try_from(value: StateTypeId) -> Result<Self, Self::Error> {
        StateType::ALL
            .into_iter()
            .find(|t| t.id() == value)
            .ok_or_else(|| CoreError::Validation(format!("Unknown state type {value}")))
    }
}

/// Key-value state types, used when copying or exporting the k-v family.
pub const KV_STATE_TYPES: [StateType; 3] = [
    StateType::Dependencies,
    StateType::DragShadow,
    StateType::DottedLineSquare,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for t in StateType::ALL {
            assert_eq!(StateType::try_from(t.id()).unwrap(), t);
        }
    }

    #[test]
    fn unknown_id_is_rejected() {
        assert!(StateType::try_from(0).is_err());
        assert!(StateType::try_from(99).is_err());
    }

    #[test]
    fn families() {
        assert_eq!(StateType::Components.family(), StateFamily::Tree);
        assert_eq!(StateType::DisplayName.family(), StateFamily::Set);
        for t in KV_STATE_TYPES {
            assert_eq!(t.family(), StateFamily::KeyValue);
        }
    }

    #[test]
    fn serializes_as_number() {
        assert_eq!(serde_json::to_string(&StateType::DragShadow).unwrap(), "3");
        let parsed: StateType = serde_json::from_str("5").unwrap();
        assert_eq!(parsed, StateType::DisplayName);
    }
}

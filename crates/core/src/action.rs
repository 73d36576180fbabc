//! Action descriptors: named calls against external resources.
//!
//! Actions are created over HTTP and copied between versions with the rest
//! of an app's state. The server never executes them; it only stores the
//! template.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// SMALLINT representation of an action type.
pub type ActionTypeId = i16;

macro_rules! define_action_types {
    ( $( $variant:ident = $id:literal => $name:literal ),+ $(,)? ) => {
        /// Resource kind an action runs against.
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ActionType {
            $( $variant = $id ),+
        }

        impl ActionType {
            pub const ALL: &'static [ActionType] = &[ $( ActionType::$variant ),+ ];

            pub fn id(self) -> ActionTypeId {
                self as ActionTypeId
            }

            /// Name used on the wire, e.g. `"postgresql"`.
            pub fn name(self) -> &'static str {
                match self {
                    $( ActionType::$variant => $name ),+
                }
            }

            pub fn from_name(name: &str) -> Result<Self, CoreError> {
                match name {
                    $( $name => Ok(ActionType::$variant), )+
                    other => Err(CoreError::Validation(format!("Unknown action type '{other}'"))),
                }
            }
        }
    };
}

define_action_types! {
    Transformer = 1 => "transformer",
    RestApi = 2 => "restapi",
    GraphQl = 3 => "graphql",
    Redis = 4 => "redis",
    MySql = 5 => "mysql",
    MariaDb = 6 => "mariadb",
    PostgreSql = 7 => "postgresql",
    MongoDb = 8 => "mongodb",
    TiDb = 9 => "tidb",
    ElasticSearch = 10 => "elasticsearch",
    S3 = 11 => "s3",
    Smtp = 12 => "smtp",
    SupabaseDb = 13 => "supabasedb",
    Firebase = 14 => "firebase",
    ClickHouse = 15 => "clickhouse",
    MsSql = 16 => "mssql",
    HuggingFace = 17 => "huggingface",
    DynamoDb = 18 => "dynamodb",
    Snowflake = 19 => "snowflake",
    CouchDb = 20 => "couchdb",
    HfEndpoint = 21 => "hfendpoint",
    Oracle = 22 => "oracle",
    Appwrite = 23 => "appwrite",
    GoogleSheets = 24 => "googlesheets",
    Neon = 25 => "neon",
    Hydra = 26 => "hydra",
}

impl ActionType {
    /// Transformers run client-side and have no backing resource.
    pub fn requires_resource(self) -> bool {
        self != ActionType::Transformer
    }
}

impl TryFrom<ActionTypeId> for ActionType {
    type Error = CoreError;

    fn try_from(value: ActionTypeId) -> Result<Self, Self::Error> {
        ActionType::ALL
            .iter()
            .copied()
            .find(|t| t.id() == value)
            .ok_or_else(|| CoreError::Validation(format!("Unknown action type {value}")))
    }
}

impl Serialize for ActionType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ActionType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        ActionType::from_name(&name).map_err(serde::de::Error::custom)
    }
}

/// When an action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionTriggerMode {
    Manually,
    Automate,
}

impl ActionTriggerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionTriggerMode::Manually => "manually",
            ActionTriggerMode::Automate => "automate",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "manually" => Ok(ActionTriggerMode::Manually),
            "automate" => Ok(ActionTriggerMode::Automate),
            other => Err(CoreError::Validation(format!(
                "Unknown action trigger mode '{other}'"
            ))),
        }
    }
}

/// Per-action settings stored in the `config` JSON column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionConfig {
    /// Runnable by anonymous viewers of a public release.
    pub public: bool,
}

/// Check the resource reference against the action type.
pub fn validate_resource_ref(action_type: ActionType, resource_ref_id: DbId) -> Result<(), CoreError> {
    if action_type.requires_resource() && resource_ref_id <= 0 {
        return Err(CoreError::Validation(format!(
            "Action type '{}' requires a resource",
            action_type.name()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn more_than_twenty_kinds_with_unique_ids() {
        assert!(ActionType::ALL.len() > 20);
        for t in ActionType::ALL {
            assert_eq!(ActionType::try_from(t.id()).unwrap(), *t);
            assert_eq!(ActionType::from_name(t.name()).unwrap(), *t);
        }
    }

    #[test]
    fn serializes_by_name() {
        assert_eq!(serde_json::to_value(ActionType::PostgreSql).unwrap(), json!("postgresql"));
        let parsed: ActionType = serde_json::from_value(json!("googlesheets")).unwrap();
        assert_eq!(parsed, ActionType::GoogleSheets);
        assert!(serde_json::from_value::<ActionType>(json!("cobol")).is_err());
    }

    #[test]
    fn transformer_needs_no_resource() {
        assert!(validate_resource_ref(ActionType::Transformer, 0).is_ok());
        assert!(validate_resource_ref(ActionType::MySql, 0).is_err());
        assert!(validate_resource_ref(ActionType::MySql, 9).is_ok());
    }

    #[test]
    fn trigger_modes() {
        assert_eq!(ActionTriggerMode::parse("automate").unwrap(), ActionTriggerMode::Automate);
        assert_eq!(ActionTriggerMode::Manually.as_str(), "manually");
        assert!(ActionTriggerMode::parse("sometimes").is_err());
    }
}

//! App configuration and the recent-editors list.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// Maximum number of entries kept in an app's edited-by list.
pub const MAX_EDITED_BY: usize = 4;

/// Per-app settings stored in the `config` JSON column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Release version readable without authentication.
    pub public: bool,
    pub water_mark: bool,
    pub description: String,
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            public: false,
            water_mark: true,
            description: String::new(),
        }
    }
}

/// One entry of the recent-editors list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditedBy {
    pub user_id: DbId,
    pub nickname: String,
    pub avatar: String,
    pub email: String,
    pub edited_at: Timestamp,
}

/// Move `editor` to the front of `list`, dropping any older entry for the
/// same user, then cap the list at [`MAX_EDITED_BY`].
pub fn push_editor(list: &mut Vec<EditedBy>, editor: EditedBy) {
    list.retain(|e| e.user_id != editor.user_id);
    list.insert(0, editor);
    list.truncate(MAX_EDITED_BY);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor(id: DbId) -> EditedBy {
        EditedBy {
            user_id: id,
            nickname: format!("user{id}"),
            avatar: String::new(),
            email: format!("user{id}@example.com"),
            edited_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn newest_editor_first_and_deduplicated() {
        let mut list = Vec::new();
        push_editor(&mut list, editor(1));
        push_editor(&mut list, editor(2));
        push_editor(&mut list, editor(1));

        let ids: Vec<_> = list.iter().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn list_is_capped() {
        let mut list = Vec::new();
        for id in 1..=6 {
            push_editor(&mut list, editor(id));
        }
        let ids: Vec<_> = list.iter().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![6, 5, 4, 3]);
    }

    #[test]
    fn config_defaults_missing_fields() {
        let config: AppConfig = serde_json::from_str(r#"{"public":true}"#).unwrap();
        assert!(config.public);
        assert!(!config.water_mark);
        assert_eq!(config.description, "");
        assert!(AppConfig::new().water_mark);
    }
}

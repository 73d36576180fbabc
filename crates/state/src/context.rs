use canopy_core::types::DbId;

/// Who is editing which app. Every realtime mutation carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditContext {
    pub team_id: DbId,
    pub app_id: DbId,
    pub user_id: DbId,
}

impl EditContext {
    pub fn new(team_id: DbId, app_id: DbId, user_id: DbId) -> Self {
        Self {
            team_id,
            app_id,
            user_id,
        }
    }
}

use crate::OrderRecord;

/// Filter for listing orders.
///
/// Results are ordered by creation time, oldest first.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Only orders in this status (matched against the stored status string).
    pub status: Option<String>,

    /// Only orders placed by this user.
    pub user_id: Option<i64>,

    pub limit: Option<usize>,

    pub offset: Option<usize>,
}

impl OrderQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether a record passes the status and user filters.
    pub fn matches(&self, record: &OrderRecord) -> bool {
        if let Some(ref status) = self.status
            && &record.status != status
        {
            return false;
        }
        if let Some(user_id) = self.user_id
            && record.user_id != user_id
        {
            return false;
        }
        true
    }
}

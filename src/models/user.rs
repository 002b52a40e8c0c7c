use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A digest recipient. Credentials live with the API layer, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub is_active: bool,
    pub categories: Vec<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

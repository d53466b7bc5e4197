//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// User profile. Accounts are managed elsewhere; this crate only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID (also used as document ID)
    pub user_id: u64,
    /// Display name shown in participant lists
    pub nickname: String,
    /// Email address (may be None if not shared)
    pub email: Option<String>,
    pub height_cm: Option<u32>,
    pub weight_kg: Option<u32>,
}

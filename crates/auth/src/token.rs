use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{ServiceError, ServiceResult, TokenUid, UserId};

/// Transport-level facts about the request that asked for a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub remote_addr: Option<String>,
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Audit record of one issuance.
///
/// Written once, never updated. `uid` equals the `jti` of the access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub uid: TokenUid,
    pub user_id: UserId,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub remote_addr: Option<String>,
    pub forwarded_for: Option<String>,
    pub real_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn validate(&self) -> ServiceResult<()> {
        if self.expired_at <= self.created_at {
            return Err(ServiceError::validation(
                "expired_at",
                "must be after created_at",
            ));
        }
        if self.access_token.is_empty() {
            return Err(ServiceError::validation("access_token", "is required"));
        }
        Ok(())
    }
}

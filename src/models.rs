use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progression::ProfileMetrics;

/// A mini-app user. Keyed by the Telegram-assigned id; created lazily on
/// first contact and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub points: i64,
    pub invite_points: i64,
    pub invited_by: Option<String>,
    pub invited_users: Vec<String>,
    pub activity_log: Vec<f64>,
    pub transaction_status: Vec<String>,
    pub intro_seen: bool,
    pub created_at: DateTime<Utc>,
}

/// Profile fields for a fresh user row. The referral label, when there is
/// one, travels separately as part of the decided binding.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub intro_seen: bool,
}

/// Body of `/api/user`: the Telegram WebApp user object plus the optional
/// action flags the mini-app sends on the same call.
#[derive(Debug, Deserialize)]
pub struct UserPayload {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub start_param: Option<String>,
    #[serde(alias = "introSeen")]
    pub intro_seen: Option<bool>,
    #[serde(alias = "newTransaction")]
    pub new_transaction: Option<bool>,
    #[serde(alias = "updateTransactionStatus")]
    pub update_transaction_status: Option<StatusUpdate>,
}

/// Random-access write into the transaction history. `amount` is the
/// completed volume and is only accepted together with `completed`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub index: i64,
    pub status: String,
    pub amount: Option<f64>,
}

/// Body of `/api/member`: resolve-or-create without the action flags.
#[derive(Debug, Deserialize)]
pub struct MemberPayload {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub start_param: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfilePayload {
    pub id: i64,
}

/// Two-party invite confirmation. Accepts both wire variants:
/// `{ inviterId, inviteeId }` and `{ userId, inviterId, action }`.
#[derive(Debug, Deserialize)]
pub struct InviteProcessPayload {
    #[serde(alias = "inviterId")]
    pub inviter_id: i64,
    #[serde(alias = "inviteeId", alias = "userId")]
    pub invitee_id: i64,
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramIdPayload {
    #[serde(alias = "telegramId")]
    pub telegram_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PointsQueryPayload {
    pub username: String,
}

/// Inviter profile echoed back to the client on `/api/user`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviterInfo {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl InviterInfo {
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// Response of `/api/user`: the record, derived metrics flattened in, and
/// the transaction history under the `status` key the client reads.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user: User,
    pub inviter_info: Option<InviterInfo>,
    #[serde(flatten)]
    pub metrics: ProfileMetrics,
    pub status: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteProcessResponse {
    pub inviter: User,
    pub invitee: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncreasePointsResponse {
    pub success: bool,
    pub points: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsSummary {
    pub username: Option<String>,
    pub total_points: i64,
    pub invite_points: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitePointsResponse {
    pub invite_points: i64,
}

/// One row of the invite list: the stored label plus the invitee's current
/// totals. Labels that no longer resolve report zeros.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitedUserDetail {
    pub username: String,
    pub total_points: i64,
    pub earned_points: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitedUsersResponse {
    pub invited_users_details: Vec<InvitedUserDetail>,
}

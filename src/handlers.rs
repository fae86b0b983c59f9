//! HTTP handlers. Each one loads the involved user records, runs the pure
//! referral/progression logic, persists the outcome, and serializes the
//! response; errors propagate as [`ServiceError`] and map to status codes
//! in the transport layer.

use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::error::ServiceError;
use crate::models::{
    IncreasePointsResponse, InviteProcessPayload, InviteProcessResponse, InvitePointsResponse,
    InvitedUserDetail, InvitedUsersResponse, InviterInfo, MemberPayload, MemberResponse, NewUser,
    PointsQueryPayload, PointsSummary, ProfilePayload, TelegramIdPayload, User, UserPayload,
    UserResponse,
};
use crate::progression::{self, TransactionStatus, LEVELS};
use crate::referral;
use crate::storage;

/// Deep-link payloads are arbitrary client data; anything that does not
/// parse as a numeric id simply means "no referral".
fn parse_start_param(start_param: Option<&str>) -> Option<i64> {
    start_param.and_then(|s| s.trim().parse::<i64>().ok())
}

/// Idempotent find-or-create. Referral binding happens here and only here,
/// at creation time: an existing record returns as-is no matter what
/// `start_param` accompanies the call, so repeated contacts can never
/// rebind or re-credit.
async fn resolve_or_create(
    pool: &PgPool,
    fields: NewUser,
    start_param: Option<&str>,
) -> Result<User, ServiceError> {
    if let Some(existing) = storage::find_by_telegram_id(pool, fields.telegram_id).await? {
        return Ok(existing);
    }

    let inviter = match parse_start_param(start_param) {
        Some(inviter_id) if inviter_id != fields.telegram_id => {
            storage::find_by_telegram_id(pool, inviter_id).await?
        }
        _ => None,
    };

    match inviter {
        Some(inviter) => {
            let binding =
                referral::plan_referral(&inviter, fields.telegram_id, fields.username.as_deref());
            log::info!(
                "user {} joined via referral from {}, crediting {} points",
                fields.telegram_id,
                inviter.telegram_id,
                binding.award
            );
            storage::create_with_referral(pool, &fields, inviter.telegram_id, &binding).await
        }
        None => storage::create_user(pool, &fields).await,
    }
}

/// POST /api/user — resolve-or-create plus the optional action flags the
/// mini-app piggybacks on the same call.
pub async fn user(
    pool: web::Data<PgPool>,
    payload: web::Json<UserPayload>,
) -> Result<HttpResponse, ServiceError> {
    let payload = payload.into_inner();
    let pool = pool.get_ref();

    let fields = NewUser {
        telegram_id: payload.id,
        username: payload.username.clone(),
        first_name: payload.first_name.clone(),
        last_name: payload.last_name.clone(),
        intro_seen: payload.intro_seen.unwrap_or(false),
    };
    let mut user = resolve_or_create(pool, fields, payload.start_param.as_deref()).await?;

    if payload.intro_seen == Some(true) && !user.intro_seen {
        user = storage::set_intro_seen(pool, user.telegram_id).await?;
    }

    if payload.new_transaction == Some(true) {
        if !progression::can_initiate_new_transaction(&user.transaction_status) {
            return Err(ServiceError::Conflict(
                "cannot start a new transaction while the previous one is processing".to_string(),
            ));
        }
        user = storage::push_transaction_status(
            pool,
            user.telegram_id,
            TransactionStatus::Processing.as_str(),
        )
        .await?;
    }

    if let Some(update) = &payload.update_transaction_status {
        let status: TransactionStatus = update.status.parse()?;
        if update.amount.is_some() && status != TransactionStatus::Completed {
            return Err(ServiceError::InvalidInput(
                "amount is only valid when completing a transaction".to_string(),
            ));
        }
        let index = usize::try_from(update.index).map_err(|_| {
            ServiceError::InvalidInput(format!("transaction index {} out of range", update.index))
        })?;
        let mut history = user.transaction_status.clone();
        progression::apply_status_update(&mut history, index, status)?;
        user =
            storage::replace_transaction_log(pool, user.telegram_id, &history, update.amount)
                .await?;
    }

    let inviter_info = match parse_start_param(payload.start_param.as_deref()) {
        Some(inviter_id) => storage::find_by_telegram_id(pool, inviter_id)
            .await?
            .map(|inviter| InviterInfo::from_user(&inviter)),
        None => None,
    };

    let metrics = progression::derive_metrics(&user.activity_log, &LEVELS);
    let status = user.transaction_status.clone();
    Ok(HttpResponse::Ok().json(UserResponse {
        user,
        inviter_info,
        metrics,
        status,
    }))
}

/// POST /api/member — slim resolve-or-create.
pub async fn member(
    pool: web::Data<PgPool>,
    payload: web::Json<MemberPayload>,
) -> Result<HttpResponse, ServiceError> {
    let payload = payload.into_inner();
    let fields = NewUser {
        telegram_id: payload.id,
        username: payload.username.clone(),
        first_name: payload.first_name.clone(),
        last_name: payload.last_name.clone(),
        intro_seen: false,
    };
    let user =
        resolve_or_create(pool.get_ref(), fields, payload.start_param.as_deref()).await?;
    Ok(HttpResponse::Ok().json(MemberResponse { user }))
}

/// POST /api/profile — derived metrics for an existing user.
pub async fn profile(
    pool: web::Data<PgPool>,
    payload: web::Json<ProfilePayload>,
) -> Result<HttpResponse, ServiceError> {
    let user = storage::find_by_telegram_id(pool.get_ref(), payload.id)
        .await?
        .ok_or(ServiceError::NotFound("user"))?;
    let metrics = progression::derive_metrics(&user.activity_log, &LEVELS);
    Ok(HttpResponse::Ok().json(metrics))
}

/// POST /api/invite/process — explicit two-party confirmation. Both records
/// must resolve, the invitee must still be unbound, and the mutations land
/// atomically.
pub async fn process_invite(
    pool: web::Data<PgPool>,
    payload: web::Json<InviteProcessPayload>,
) -> Result<HttpResponse, ServiceError> {
    let payload = payload.into_inner();
    let pool = pool.get_ref();

    if let Some(action) = payload.action.as_deref() {
        if action != "process" {
            return Err(ServiceError::InvalidInput(format!(
                "unsupported action '{}'",
                action
            )));
        }
    }

    let inviter = storage::find_by_telegram_id(pool, payload.inviter_id)
        .await?
        .ok_or(ServiceError::NotFound("inviter"))?;
    let invitee = storage::find_by_telegram_id(pool, payload.invitee_id)
        .await?
        .ok_or(ServiceError::NotFound("invitee"))?;

    let binding = referral::record_invite(&inviter, &invitee)?;
    let (inviter, invitee) =
        storage::apply_invite(pool, inviter.telegram_id, invitee.telegram_id, &binding).await?;
    log::info!(
        "invite processed: {} invited {}, crediting {} points",
        inviter.telegram_id,
        invitee.telegram_id,
        binding.award
    );

    Ok(HttpResponse::Ok().json(InviteProcessResponse { inviter, invitee }))
}

/// POST /api/points/increase — fixed unit activity tick.
pub async fn increase_points(
    pool: web::Data<PgPool>,
    payload: web::Json<TelegramIdPayload>,
) -> Result<HttpResponse, ServiceError> {
    let user = storage::increment_points(pool.get_ref(), payload.telegram_id, 1)
        .await?
        .ok_or(ServiceError::NotFound("user"))?;
    Ok(HttpResponse::Ok().json(IncreasePointsResponse {
        success: true,
        points: user.points,
    }))
}

/// POST /api/points/query — points summary by display handle.
pub async fn query_points(
    pool: web::Data<PgPool>,
    payload: web::Json<PointsQueryPayload>,
) -> Result<HttpResponse, ServiceError> {
    let handle = referral::normalize_handle(&payload.username);
    let user = storage::find_by_username(pool.get_ref(), handle)
        .await?
        .ok_or(ServiceError::NotFound("user"))?;
    Ok(HttpResponse::Ok().json(PointsSummary {
        username: user.username,
        total_points: user.points,
        invite_points: user.invite_points,
    }))
}

/// POST /api/invite-points/recompute — re-derive the earned-share sum over
/// the invite list and store it. Labels that no longer resolve contribute
/// nothing.
pub async fn recompute_invite_points(
    pool: web::Data<PgPool>,
    payload: web::Json<TelegramIdPayload>,
) -> Result<HttpResponse, ServiceError> {
    let pool = pool.get_ref();
    let user = storage::find_by_telegram_id(pool, payload.telegram_id)
        .await?
        .ok_or(ServiceError::NotFound("user"))?;

    let mut total = 0i64;
    for label in &user.invited_users {
        if let Some(invited) = storage::resolve_label(pool, label).await? {
            total += referral::earned_share(invited.points);
        }
    }

    let updated = storage::set_invite_points(pool, user.telegram_id, total).await?;
    Ok(HttpResponse::Ok().json(InvitePointsResponse {
        invite_points: updated.invite_points,
    }))
}

/// POST /api/invited-users — per-invitee detail list for the invite page.
pub async fn invited_users(
    pool: web::Data<PgPool>,
    payload: web::Json<TelegramIdPayload>,
) -> Result<HttpResponse, ServiceError> {
    let pool = pool.get_ref();
    let user = storage::find_by_telegram_id(pool, payload.telegram_id)
        .await?
        .ok_or(ServiceError::NotFound("user"))?;

    let mut details = Vec::with_capacity(user.invited_users.len());
    for label in &user.invited_users {
        let detail = match storage::resolve_label(pool, label).await? {
            Some(invited) => InvitedUserDetail {
                username: label.clone(),
                total_points: invited.points,
                earned_points: referral::earned_share(invited.points),
            },
            None => InvitedUserDetail {
                username: label.clone(),
                total_points: 0,
                earned_points: 0,
            },
        };
        details.push(detail);
    }

    Ok(HttpResponse::Ok().json(InvitedUsersResponse {
        invited_users_details: details,
    }))
}

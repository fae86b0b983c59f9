//! Referral-binding decisions and the derived earned-share arithmetic.
//!
//! The functions here are pure: handlers load the involved user records,
//! ask this module what the binding looks like, and hand the result to the
//! storage layer to apply. A binding exists at most once per invitee; the
//! unset `invited_by` field is the idempotency key, so repeated calls with
//! the same pair can never re-credit the award.

use crate::error::ServiceError;
use crate::models::User;

/// Fixed bonus credited to an inviter for a new, validated referral.
pub const INVITE_AWARD: i64 = 2500;

/// Inviter's share of an invitee's total points: 20%, floored.
pub fn earned_share(invitee_total_points: i64) -> i64 {
    invitee_total_points / 5
}

/// Strips one leading `@` marker. Stored labels carry it, lookups must not.
pub fn normalize_handle(label: &str) -> &str {
    label.strip_prefix('@').unwrap_or(label)
}

/// The stored-label form of a user reference: `@handle` when a handle
/// exists, `@<telegram id>` otherwise.
pub fn referral_label(username: Option<&str>, telegram_id: i64) -> String {
    match username {
        Some(handle) if !handle.is_empty() => format!("@{}", handle),
        _ => format!("@{}", telegram_id),
    }
}

/// A fully-decided referral binding, ready for the storage layer to apply
/// atomically: label the invitee, append to the inviter's list, credit the
/// award.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralBinding {
    /// Label written to the invitee's `invited_by`.
    pub invited_by: String,
    /// Label appended to the inviter's `invited_users`.
    pub invitee_label: String,
    /// Points credited to the inviter.
    pub award: i64,
}

/// Decides the creation-time binding for a brand-new invitee. Callers only
/// invoke this when the invitee record does not exist yet; an existing
/// record goes through [`record_invite`], which checks the precondition.
pub fn plan_referral(inviter: &User, invitee_id: i64, invitee_username: Option<&str>) -> ReferralBinding {
    ReferralBinding {
        invited_by: referral_label(inviter.username.as_deref(), inviter.telegram_id),
        invitee_label: referral_label(invitee_username, invitee_id),
        award: INVITE_AWARD,
    }
}

/// Explicit two-party confirmation over already-loaded records. Refuses
/// self-invites and invitees that are already bound.
pub fn record_invite(inviter: &User, invitee: &User) -> Result<ReferralBinding, ServiceError> {
    if inviter.telegram_id == invitee.telegram_id {
        return Err(ServiceError::InvalidInput(
            "a user cannot invite themselves".to_string(),
        ));
    }
    if invitee.invited_by.is_some() {
        return Err(ServiceError::AlreadyInvited);
    }
    Ok(plan_referral(
        inviter,
        invitee.telegram_id,
        invitee.username.as_deref(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(telegram_id: i64, username: Option<&str>) -> User {
        User {
            telegram_id,
            username: username.map(|s| s.to_string()),
            first_name: None,
            last_name: None,
            points: 0,
            invite_points: 0,
            invited_by: None,
            invited_users: Vec::new(),
            activity_log: Vec::new(),
            transaction_status: Vec::new(),
            intro_seen: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn earned_share_is_twenty_percent_floored() {
        assert_eq!(earned_share(1000), 200);
        assert_eq!(earned_share(0), 0);
        assert_eq!(earned_share(4), 0);
        assert_eq!(earned_share(12_345), 2469);
    }

    #[test]
    fn normalize_strips_a_single_marker() {
        assert_eq!(normalize_handle("@alice"), "alice");
        assert_eq!(normalize_handle("alice"), "alice");
        assert_eq!(normalize_handle("@@alice"), "@alice");
    }

    #[test]
    fn label_prefers_handle_over_id() {
        assert_eq!(referral_label(Some("bob"), 7), "@bob");
        assert_eq!(referral_label(None, 7), "@7");
        assert_eq!(referral_label(Some(""), 7), "@7");
    }

    #[test]
    fn labels_survive_normalized_lookup() {
        let label = referral_label(Some("carol"), 9);
        assert_eq!(normalize_handle(&label), "carol");
        let fallback = referral_label(None, 9);
        assert_eq!(normalize_handle(&fallback).parse::<i64>().unwrap(), 9);
    }

    #[test]
    fn binding_uses_both_parties_labels() {
        let inviter = user(1, Some("alice"));
        let binding = plan_referral(&inviter, 2, Some("bob"));
        assert_eq!(binding.invited_by, "@alice");
        assert_eq!(binding.invitee_label, "@bob");
        assert_eq!(binding.award, INVITE_AWARD);
    }

    #[test]
    fn binding_falls_back_to_numeric_ids() {
        let inviter = user(1, None);
        let binding = plan_referral(&inviter, 2, None);
        assert_eq!(binding.invited_by, "@1");
        assert_eq!(binding.invitee_label, "@2");
    }

    #[test]
    fn record_invite_refuses_a_bound_invitee() {
        let inviter = user(1, Some("alice"));
        let mut invitee = user(2, Some("bob"));
        invitee.invited_by = Some("@alice".to_string());
        assert!(matches!(
            record_invite(&inviter, &invitee),
            Err(ServiceError::AlreadyInvited)
        ));
    }

    #[test]
    fn record_invite_refuses_self_invites() {
        let inviter = user(1, Some("alice"));
        let same = user(1, Some("alice"));
        assert!(matches!(
            record_invite(&inviter, &same),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn record_invite_yields_the_award_for_a_fresh_invitee() {
        let inviter = user(1, Some("alice"));
        let invitee = user(2, None);
        let binding = record_invite(&inviter, &invitee).unwrap();
        assert_eq!(binding.invited_by, "@alice");
        assert_eq!(binding.invitee_label, "@2");
        assert_eq!(binding.award, 2500);
    }
}

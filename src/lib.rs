//! Referral/points ledger for a Telegram mini-app: lazy user creation,
//! one-time invite binding with a fixed inviter award, and level/XP
//! derivation over each user's activity log.

pub mod error;
pub mod handlers;
pub mod models;
pub mod progression;
pub mod referral;
pub mod storage;

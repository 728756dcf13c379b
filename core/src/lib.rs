//! Promotional reward redemption engine.
//!
//! `RedemptionCoordinator::redeem_coupon` is the only entry point. It
//! hands out each coupon at most once and keeps every reward under its
//! total and per-day ceilings, also when attempts race.

pub mod allocator;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod limits;
pub mod store;
pub mod types;
pub mod validity;

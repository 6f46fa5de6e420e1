//! Domain layer: ledger records, identifiers, amounts, and events.
//!
//! This module holds the server-side model of the gift/transaction ledger
//! together with the pieces of request validation that do not depend on
//! HTTP: amount bounds, idempotency keys, return paths, and the
//! process-local rate limiter.

pub mod event_bus;
pub mod idempotency;
pub mod ids;
pub mod ledger_event;
pub mod money;
pub mod rate_limiter;
pub mod record;
pub mod return_path;

pub use event_bus::EventBus;
pub use idempotency::IdempotencyKey;
pub use ids::{RecordId, UserId};
pub use ledger_event::{Channel, LedgerEvent};
pub use money::AmountBounds;
pub use rate_limiter::{RateLimitKey, RateLimiter};
pub use record::{GiftRecord, GiftTarget, RecordKind, RecordStatus, Unit};
pub use return_path::ReturnPath;

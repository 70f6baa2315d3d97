//! Notification preferences, delivery history and everything built on top of them.
//!
//! ## Submodules
//!
//! - `store` - queries against the notification tables
//! - `backfill` - one-off migration of legacy per-user JSON settings
//! - `delivery` - sending through an external messenger and recording the outcome

pub mod backfill;
pub mod delivery;
pub mod store;

pub use backfill::{BackfillReport, VerifyReport, backfill_all, verify_backfill};
pub use delivery::{DeliveryOutcome, DeliveryRequest, Dispatcher, MessageSender, SendError};
pub use store::{NewHistoryEntry, NewUser, NotificationStore, Subscriber};

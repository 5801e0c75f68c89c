//! remsync — remote-state synchronization for REST-backed dashboards.
//!
//! The pattern this crate packages appeared, hand-rolled and slightly
//! differently each time, on every page of a role-based case-management
//! platform: an in-memory copy of a server-side list, a pure filtered/sorted
//! view over it, mutation handlers that reconcile their result back into the
//! copy, and a timer that re-fetches on a cadence. This is that pattern
//! once, with the races the copies tolerated closed:
//!
//! - one auth transport per deployment, configured at bootstrap;
//! - loads never clear the previous data until a replacement arrives, and a
//!   stale response can never overwrite a newer one (monotonic sequence
//!   guard);
//! - every request carries a client-side timeout;
//! - the refresh countdown is derived from a single wall-clock deadline;
//! - user-visible reporting happens in exactly one place, and an expired
//!   session is a first-class signal that stops polling instead of toasting.
//!
//! # Quick start
//!
//! ```ignore
//! use remsync::{Config, HttpClient, Session, Role, CollectionSync};
//!
//! let config = Config::load(None)?;
//! let session = Session::new("u-17", Role::Coordinator).with_token(token);
//! let client = std::sync::Arc::new(HttpClient::new(&config, session)?);
//!
//! let cases: CollectionSync<Case> =
//!     CollectionSync::new(client.clone(), "/coordinator/cases")
//!         .with_payload_keys(&["cases"]);
//! cases.load().await?;
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod errors;
pub mod notify;
pub mod projection;
pub mod scheduler;
pub mod session;
pub mod telemetry;
pub mod transfer;

pub use cache::{Collection, CollectionSync, Entity, LoadTicket};
pub use client::{ApiTransport, HttpClient, Method};
pub use config::{AuthTransport, Config, Reconcile};
pub use dispatch::{Dispatcher, MutationState, SelectionSet};
pub use errors::{ApiError, Result, SyncError};
pub use notify::{Notice, NoticeLevel, Notifier};
pub use projection::{project, FilterState, Projectable, SortDirection, SortState, SortValue};
pub use scheduler::{Countdown, Poller, PollerHandle};
pub use session::{Role, Session};

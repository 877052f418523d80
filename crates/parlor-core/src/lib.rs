//! # parlor-core
//!
//! Core types, storage and room logic for the Parlor chat room.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Room** - Entry point that owns the store handle
//! - **Presence** - Participant join, heartbeat and departure
//! - **Router** - Posting messages and serving recipient-scoped feeds
//! - **Sweeper** - Recurring eviction of idle participants
//! - **Store** - Persistence abstraction with memory and SQLite backends
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│    Room     │────▶│    Store    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            ▲
//!                            │
//!                     ┌─────────────┐
//!                     │   Sweeper   │
//!                     └─────────────┘
//! ```

pub mod error;
pub mod message;
pub mod presence;
pub mod room;
pub mod router;
pub mod store;
pub mod sweeper;

pub use error::ChatError;
pub use message::{Message, MessageKind, BROADCAST, JOIN_TEXT, LEAVE_TEXT};
pub use presence::Participant;
pub use room::{Room, RoomConfig};
pub use router::{parse_limit, MessageQuery};
pub use store::{MemoryStore, Store, StoreError};
pub use sweeper::{SweepReport, Sweeper, SweeperConfig};

#[cfg(feature = "sqlite")]
pub use store::SqliteStore;

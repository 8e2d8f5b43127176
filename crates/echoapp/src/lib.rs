//! # Echo Architecture
//!
//! Echo keeps social interactions consistent on top of a plain document store
//! that has no transactions. A like, a follow or a comment is three facts kept
//! in different documents:
//!
//! - an **edge record** (`likes`, `follows`) or a comment document,
//! - a **denormalized counter** on the target (`likeCount`, `followerCount`, ...),
//! - a **notification** for the target's owner.
//!
//! The edge record is the source of truth. Counters must eventually equal the
//! number of edges, and a like/follow notification exists exactly when its edge
//! does (and the actor is not the owner).
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (crates/echo)                                          │
//! │  - clap parsing, rendering, process exit codes              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API (api.rs) + optimistic view state (view.rs)             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Coordinators (coordinator/), notifications, reconcile      │
//! │  - ordered write sequences, failure classification          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Store (store/)                                             │
//! │  - RemoteStore trait, FsStore, MemStore                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! From `api.rs` inward nothing writes to stdout/stderr; diagnostics go
//! through `tracing` and are only visible when the binary installs a
//! subscriber.
//!
//! ## Testing
//!
//! Coordinators are tested against `MemStore`, which can fail any operation on
//! demand and records the order of calls. The file store has its own
//! integration tests under `tests/`.

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod notifications;
pub mod reconcile;
pub mod store;
pub mod view;

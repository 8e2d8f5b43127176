//! # CLI Behavior
//!
//! This is **one possible UI client** for echo, not the application itself.
//! It is the only place that knows about terminal I/O, exit codes and output
//! formatting.
//!
//! ## Gestures
//!
//! `like`/`unlike` and `follow`/`unfollow` are explicit: `like` on something
//! already liked reports it unchanged instead of flipping it back. The
//! toggle-with-rollback flow of a button lives in the library
//! (`EchoApi::like_gesture`) for interactive clients.
//!
//! ## Output
//!
//! Text by default, `--json` for scripts. Logs go to stderr through `tracing`
//! and are silent unless `RUST_LOG`, `ECHO_LOG` or `--verbose` ask for them.
//!
//! ## Module Structure
//!
//! - `commands`: config + logging setup, store wiring, dispatch
//! - `render`: text and JSON output
//! - `setup`: argument parsing via clap
//! - `styles`: terminal styles

mod commands;
mod render;
pub mod setup;
mod styles;

pub use commands::run;

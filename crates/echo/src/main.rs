//! # Echo CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/`, while this
//! file only invokes `cli::run()` and handles process termination.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (src/cli/)                                       │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - config, logging, store wiring + dispatch (commands.rs)   │
//! │  - text / JSON rendering (render.rs, styles.rs)             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  echoapp::api::EchoApi over a FsStore                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every command names its acting user explicitly with `--as <user>` (or
//! `ECHO_USER`). There is no login state.

mod cli;

use echoapp::error::EchoError;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        if e
            .downcast_ref::<EchoError>()
            .is_some_and(EchoError::left_partial_state)
        {
            eprintln!("Counters may be off until `echo reconcile` runs.");
        }
        std::process::exit(1);
    }
}

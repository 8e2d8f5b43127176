//! # CLI Layer
//!
//! The only place in the codebase that:
//! - Knows about terminal I/O (stdout, stderr)
//! - Installs the `tracing` subscriber
//! - Chooses the concrete store (`FsStore` under the configured data dir)
//!
//! ## Responsibilities
//!
//! 1. **Argument Parsing**: via clap (`setup.rs`)
//! 2. **Context Setup**: load `EchoConfig`, init logging, build `EchoApi`
//! 3. **Dispatch**: one async call per command on a tokio runtime
//! 4. **Output Formatting**: text through `render.rs`, or JSON with `--json`

use super::render;
use super::setup::{Cli, Commands, UserCommands};
use anyhow::{Context, Result};
use clap::Parser;
use echoapp::api::EchoApi;
use echoapp::config::EchoConfig;
use echoapp::model::{NotificationFilter, TargetType};
use echoapp::store::fs::FsStore;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = EchoConfig::load().context("loading configuration")?;
    init_tracing(&config, cli.verbose);

    let data_dir = cli.data.clone().unwrap_or_else(|| config.data_dir());
    debug!(data_dir = %data_dir.display(), "opening store");
    let api = EchoApi::with_config(FsStore::new(data_dir), &config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    runtime.block_on(dispatch(&cli, &config, &api))
}

/// `RUST_LOG` wins, then `--verbose`, then the configured filter.
fn init_tracing(config: &EchoConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(&config.log_filter)
        }
    });
    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Print `value` as JSON with `--json`, otherwise the rendered text.
fn emit<T: Serialize>(cli: &Cli, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}

fn target_type(comment: bool) -> TargetType {
    if comment {
        TargetType::Comment
    } else {
        TargetType::Post
    }
}

async fn dispatch(cli: &Cli, config: &EchoConfig, api: &EchoApi<FsStore>) -> Result<()> {
    let actor = cli.actor();
    match &cli.command {
        Commands::User {
            action: UserCommands::Add { id, name, tag },
        } => {
            let profile = api
                .create_user(id, name.as_deref().unwrap_or(id), tag.as_deref())
                .await?;
            emit(cli, &profile, || render::user_created(id, &profile))
        }
        Commands::Post { content } => {
            let id = api.create_post(actor, &content.join(" ")).await?;
            emit(cli, &json!({ "id": id }), || render::post_created(&id))
        }
        Commands::Like { target, comment } => {
            let kind = target_type(*comment);
            let outcome = api.like(actor, target, kind).await?;
            emit(cli, &outcome, || render::like(target, kind, &outcome))
        }
        Commands::Unlike { target, comment } => {
            let kind = target_type(*comment);
            let outcome = api.unlike(actor, target, kind).await?;
            emit(cli, &outcome, || render::like(target, kind, &outcome))
        }
        Commands::Follow { user } => {
            let outcome = api.follow(actor, user).await?;
            emit(cli, &outcome, || render::follow(user, &outcome))
        }
        Commands::Unfollow { user } => {
            let outcome = api.unfollow(actor, user).await?;
            emit(cli, &outcome, || render::follow(user, &outcome))
        }
        Commands::Comment { post, content } => {
            let outcome = api.add_comment(actor, post, &content.join(" ")).await?;
            emit(cli, &outcome, || render::comment(post, &outcome))
        }
        Commands::Notifications {
            likes,
            comments,
            mark_read,
            read,
        } => {
            if let Some(id) = read {
                api.mark_read(actor, id).await?;
                let marked = json!({ "id": id, "read": true });
                return emit(cli, &marked, || render::marked_one(id));
            }
            let filter = if *likes {
                NotificationFilter::Likes
            } else if *comments {
                NotificationFilter::Comments
            } else {
                NotificationFilter::All
            };
            let list = api.notifications_matching(actor, filter).await?;
            emit(cli, &list, || render::notifications(&list))?;
            if *mark_read {
                let marked = api.mark_all_read(actor).await?;
                if !cli.json {
                    print!("{}", render::marked_read(marked));
                }
            }
            Ok(())
        }
        Commands::Status { user } => {
            let user_id = user.as_deref().unwrap_or(actor);
            let status = api.status(user_id).await?;
            emit(cli, &status, || render::status(&status))
        }
        Commands::Reconcile { every } => {
            let interval = every.unwrap_or(config.reconcile_interval_secs);
            loop {
                let report = api.reconcile().await?;
                emit(cli, &report, || render::reconcile(&report))?;
                if interval == 0 {
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_secs(interval)).await;
            }
        }
    }
}

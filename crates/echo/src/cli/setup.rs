use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "echo",
    bin_name = "echo",
    version,
    disable_help_subcommand = true,
    after_help = "Every command acts as the user given by --as (or ECHO_USER)."
)]
#[command(about = "Likes, follows and notifications over a local document store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Act as this user
    #[arg(
        long = "as",
        value_name = "USER",
        env = "ECHO_USER",
        global = true,
        help_heading = "Options"
    )]
    pub actor: Option<String>,

    /// Data directory (overrides ECHO_DATA_DIR and echo.toml)
    #[arg(long, value_name = "DIR", global = true, help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true, help_heading = "Options")]
    pub json: bool,

    /// Verbose output (debug logs on stderr)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

impl Cli {
    /// The acting user, empty when none was given. The library rejects an
    /// empty actor before touching the store.
    pub fn actor(&self) -> &str {
        self.actor.as_deref().unwrap_or("")
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users
    #[command(display_order = 1)]
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Publish a post
    #[command(display_order = 2)]
    Post {
        /// Post text (words are joined with spaces)
        #[arg(required = true, trailing_var_arg = true)]
        content: Vec<String>,
    },

    /// Like a post (or a comment with --comment)
    #[command(display_order = 3)]
    Like {
        /// Post or comment id
        target: String,

        /// The target is a comment
        #[arg(long)]
        comment: bool,
    },

    /// Remove a like
    #[command(display_order = 4)]
    Unlike {
        /// Post or comment id
        target: String,

        /// The target is a comment
        #[arg(long)]
        comment: bool,
    },

    /// Follow a user
    #[command(display_order = 5)]
    Follow { user: String },

    /// Stop following a user
    #[command(display_order = 6)]
    Unfollow { user: String },

    /// Comment on a post
    #[command(display_order = 7)]
    Comment {
        /// Post id
        post: String,

        /// Comment text (words are joined with spaces)
        #[arg(required = true, trailing_var_arg = true)]
        content: Vec<String>,
    },

    /// List notifications for the acting user
    #[command(alias = "n", display_order = 10)]
    Notifications {
        /// Only likes of your posts and comments
        #[arg(long, conflicts_with = "comments")]
        likes: bool,

        /// Only comments on your posts
        #[arg(long)]
        comments: bool,

        /// Mark everything as read after listing
        #[arg(long)]
        mark_read: bool,

        /// Mark one notification as read instead of listing
        #[arg(long, value_name = "ID", conflicts_with = "mark_read")]
        read: Option<String>,
    },

    /// Show a user's profile, posts and unread count
    #[command(display_order = 11)]
    Status {
        /// User id (defaults to the acting user)
        user: Option<String>,
    },

    /// Re-derive counters and notifications from edge records
    #[command(display_order = 20)]
    Reconcile {
        /// Repeat every N seconds (overrides reconcile_interval_secs)
        #[arg(long, value_name = "SECS")]
        every: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a user
    Add {
        /// User id
        id: String,

        /// Display name (defaults to the id)
        #[arg(long)]
        name: Option<String>,

        /// Handle shown in notifications (defaults to @id)
        #[arg(long)]
        tag: Option<String>,
    },
}

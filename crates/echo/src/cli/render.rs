//! Text rendering for CLI results.
//!
//! Every renderer is a pure function returning a `String`; `commands.rs`
//! decides whether to print it or the JSON form of the same value.

use super::styles;
use chrono::{DateTime, Utc};
use echoapp::api::UserStatus;
use echoapp::coordinator::{CommentOutcome, FollowOutcome, ToggleOutcome};
use echoapp::model::{NotificationType, StoredNotification, TargetType, UserProfile};
use echoapp::reconcile::ReconcileReport;

const TIME_WIDTH: usize = 14;

fn count_or_unknown(count: Option<i64>) -> String {
    match count {
        Some(n) => styles::count().apply_to(n).to_string(),
        None => styles::muted().apply_to("?").to_string(),
    }
}

pub fn user_created(id: &str, profile: &UserProfile) -> String {
    format!(
        "{} {} {}\n",
        styles::success().apply_to("Created user"),
        styles::id().apply_to(id),
        styles::muted().apply_to(profile.usertag.as_deref().unwrap_or_default())
    )
}

pub fn post_created(id: &str) -> String {
    format!(
        "{} {}\n",
        styles::success().apply_to("Posted"),
        styles::id().apply_to(id)
    )
}

pub fn like(target_id: &str, target_type: TargetType, outcome: &ToggleOutcome) -> String {
    let verb = match (outcome.liked, outcome.changed) {
        (true, true) => "Liked",
        (true, false) => "Already liked",
        (false, _) => "Unliked",
    };
    format!(
        "{} {} {} ({} likes)\n",
        verb,
        target_type,
        styles::id().apply_to(target_id),
        count_or_unknown(outcome.like_count)
    )
}

pub fn follow(user_id: &str, outcome: &FollowOutcome) -> String {
    let verb = match (outcome.following, outcome.changed) {
        (true, true) => "Following",
        (true, false) => "Already following",
        (false, _) => "Unfollowed",
    };
    format!(
        "{} {} ({} followers)\n",
        verb,
        styles::id().apply_to(user_id),
        count_or_unknown(outcome.follower_count)
    )
}

pub fn comment(post_id: &str, outcome: &CommentOutcome) -> String {
    format!(
        "{} {} on post {} ({} comments)\n",
        styles::success().apply_to("Commented"),
        styles::id().apply_to(&outcome.comment_id),
        styles::id().apply_to(post_id),
        count_or_unknown(outcome.comment_count)
    )
}

fn describe(n: &StoredNotification) -> String {
    let note = &n.notification;
    let who = note
        .sender_name
        .as_deref()
        .or(note.sender_usertag.as_deref())
        .unwrap_or(&note.sender_id);
    let who = styles::sender().apply_to(who);
    match note.kind {
        NotificationType::LikePost => format!("{} liked your post {}", who, note.target_id),
        NotificationType::LikeComment => match &note.post_id {
            Some(post) => format!(
                "{} liked your comment {} on {}",
                who, note.target_id, post
            ),
            None => format!("{} liked your comment {}", who, note.target_id),
        },
        NotificationType::Comment => format!(
            "{} commented on {}: {}",
            who,
            note.target_id,
            note.content.as_deref().unwrap_or_default()
        ),
        NotificationType::Follow => format!("{} started following you", who),
    }
}

pub fn notifications(list: &[StoredNotification]) -> String {
    if list.is_empty() {
        return "No notifications.\n".to_string();
    }
    let mut out = String::new();
    for n in list {
        let marker = if n.notification.read {
            " ".to_string()
        } else {
            styles::unread().apply_to("•").to_string()
        };
        out.push_str(&format!(
            "{} {} {}  {}\n",
            marker,
            styles::time().apply_to(format_time_ago(n.notification.timestamp)),
            describe(n),
            styles::muted().apply_to(&n.id)
        ));
    }
    out
}

pub fn marked_one(id: &str) -> String {
    format!("Marked {} as read\n", styles::id().apply_to(id))
}

pub fn marked_read(count: usize) -> String {
    format!("Marked {} notification(s) as read\n", count)
}

pub fn status(status: &UserStatus) -> String {
    let profile = &status.profile;
    let mut out = format!(
        "{} {}\n",
        styles::count().apply_to(profile.full_name.as_deref().unwrap_or(&status.user_id)),
        styles::muted().apply_to(profile.usertag.as_deref().unwrap_or_default())
    );
    out.push_str(&format!(
        "  {} followers  {} following  {} unread\n",
        styles::count().apply_to(profile.follower_count),
        styles::count().apply_to(profile.following_count),
        styles::unread().apply_to(status.unread_notifications)
    ));
    if status.posts.is_empty() {
        out.push_str("  No posts.\n");
        return out;
    }
    for post in &status.posts {
        out.push_str(&format!(
            "  {} {} {}  ♥ {}  ✎ {}\n",
            styles::id().apply_to(&post.id),
            styles::time().apply_to(format_time_ago(post.timestamp)),
            post.content,
            post.like_count,
            post.comment_count
        ));
    }
    out
}

pub fn reconcile(report: &ReconcileReport) -> String {
    if report.is_clean() {
        return format!("{}\n", styles::success().apply_to("Everything is consistent."));
    }
    let rows = [
        ("duplicate edges removed", report.duplicate_edges_removed),
        ("legacy edges re-keyed", report.edges_rekeyed),
        ("dangling edges removed", report.dangling_edges_removed),
        ("like counters fixed", report.like_counts_fixed),
        ("follow counters fixed", report.follow_counts_fixed),
        ("stale notifications removed", report.stale_notifications_removed),
        ("notifications restored", report.notifications_restored),
    ];
    let mut out = format!("{}\n", styles::warning().apply_to("Repaired:"));
    for (label, n) in rows.iter().filter(|(_, n)| *n > 0) {
        out.push_str(&format!("  {:>4}  {}\n", n, label));
    }
    out
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let formatter = timeago::Formatter::new();
    let time_str = formatter.convert(duration.to_std().unwrap_or_default());
    format!("{:>width$}", time_str, width = TIME_WIDTH)
}

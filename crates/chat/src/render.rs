//! Plain-text rendering of session state for the channel.

use readycheck_core::{StatusReport, Tier};

const TIME_FORMAT: &str = "%m/%d %H:%M";

/// The roster board posted in reply to a status request.
pub fn status_board(report: &StatusReport) -> String {
    let available = report.entries.iter().filter(|entry| entry.available_now).count();
    let mut lines = vec![format!(
        "({available}/{needed}) players currently available",
        needed = report.players_needed
    )];
    for entry in &report.entries {
        let marker = if entry.available_now { "✔️" } else { "❌" };
        let mut line = format!("{marker} {} {}", entry.participant, entry.window);
        if entry.tier == Tier::Backup {
            line.push_str(" (backup)");
        }
        lines.push(line);
    }
    if let Some(start) = report.confirmed_start {
        lines.push(format!("session locked in for {}", start.format(TIME_FORMAT)));
    }
    if report.vote_open {
        lines.push("a replacement vote is open".to_owned());
    }
    lines.join("\n")
}

pub fn help_message(prefix: &str) -> String {
    [
        format!("{prefix}available <when> - record when you can play, e.g. {prefix}available 6-12"),
        format!("{prefix}unavailable - take yourself off the roster"),
        format!("{prefix}count [n] - show or change how many players we need"),
        format!("{prefix}status - show the current roster"),
        format!("{prefix}setup - announce sessions in this channel"),
        format!("{prefix}debug - echo parsed windows instead of reacting"),
        format!("{prefix}nodebug - go back to quiet acknowledgements"),
        format!("{prefix}help - this message"),
    ]
    .join("\n")
}

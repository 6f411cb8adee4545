use std::fmt::Write;

use crate::models::ranking::{RankedList, Rankings, VolumeSummary};
use crate::models::ticker::Ticker;
use crate::services::watchlist::{AddOutcome, RemoveOutcome};
use crate::util::{format_percent, group_thousands};

pub const HELP_TEXT: &str = "Available commands:\n\
/dados - Latest returns: top gainers, losers and performers\n\
/volume - Latest traded volume per ticker\n\
/relatorio - Charts and PDF report\n\
/addticker <TICKER> - Track a ticker\n\
/removeticker <TICKER> - Stop tracking a ticker\n\
/listtickers - Show tracked tickers";

pub const MARKET_CLOSE_TEXT: &str = "The market has closed. Send /relatorio for today's report.";

/// Escapes the characters legacy Telegram Markdown treats as entity markers.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn push_ranked(message: &mut String, heading: &str, marker: &str, list: &RankedList) {
    let _ = writeln!(message, "*{}:*", heading);
    if list.is_empty() {
        let _ = writeln!(message, "(none)");
    }
    for sample in list {
        let _ = writeln!(
            message,
            "{} {}: {}",
            marker,
            escape_markdown(sample.ticker.as_str()),
            format_percent(sample.percent)
        );
    }
}

/// Text body of the returns snapshot.
pub fn format_returns_message(rankings: &Rankings) -> String {
    let mut message = String::new();
    push_ranked(&mut message, "Top gainers", "📈", &rankings.gainers);
    message.push('\n');
    push_ranked(&mut message, "Top losers", "📉", &rankings.losers);
    message.push('\n');
    push_ranked(&mut message, "Top performers", "🏅", &rankings.top_performers);
    message
}

/// Text body of the volume snapshot.
pub fn format_volume_message(summary: &VolumeSummary) -> String {
    let mut message = String::from("*Traded volume:*\n");
    for (ticker, volume) in summary {
        let _ = writeln!(message, "📊 {}: {}", escape_markdown(ticker.as_str()), group_thousands(*volume));
    }
    message
}

pub fn format_watchlist(tickers: &[Ticker]) -> String {
    if tickers.is_empty() {
        return "No tickers are being tracked.".to_string();
    }
    let joined: Vec<String> = tickers.iter().map(|t| escape_markdown(t.as_str())).collect();
    format!("Tracked tickers: {}", joined.join(", "))
}

pub fn format_add_outcome(outcome: &AddOutcome) -> String {
    match outcome {
        AddOutcome::Added(t) => format!("Ticker {} added.", escape_markdown(t.as_str())),
        AddOutcome::AlreadyPresent(t) => format!("Ticker {} is already tracked.", escape_markdown(t.as_str())),
    }
}

pub fn format_remove_outcome(outcome: &RemoveOutcome) -> String {
    match outcome {
        RemoveOutcome::Removed(t) => format!("Ticker {} removed.", escape_markdown(t.as_str())),
        RemoveOutcome::NotFound(t) => format!("Ticker {} is not in the list.", escape_markdown(t.as_str())),
    }
}

//! Human-readable formatting of durations and ranked summaries.

use super::summary::Summary;

/// Format nanoseconds as `1h 02m 03.456s`, `2m 03.456s` or `3.456s`.
pub fn format_duration(nanos: u64) -> String {
    let total_millis = nanos / 1_000_000;
    let millis = total_millis % 1000;
    let total_secs = total_millis / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;

    if hours > 0 {
        format!("{}h {:02}m {:02}.{:03}s", hours, mins, secs, millis)
    } else if mins > 0 {
        format!("{}m {:02}.{:03}s", mins, secs, millis)
    } else {
        format!("{}.{:03}s", secs, millis)
    }
}

/// Render ranked summaries as a fixed-width table.
pub fn format_table(summaries: &[Summary]) -> String {
    let mut out = format!(
        "{:<5} | {:<40} | {:>14} | {:>14} | {:>14} | {:>6} | {:>6}\n",
        "Rank", "Name", "Average", "Shortest", "Longest", "Passed", "Failed"
    );
    out.push_str(&format!(
        "{:-<5}-|-{:-<40}-|-{:-<14}-|-{:-<14}-|-{:-<14}-|-{:-<6}-|-{:-<6}\n",
        "", "", "", "", "", "", ""
    ));
    for s in summaries {
        out.push_str(&format!(
            "{:<5} | {:<40} | {:>14} | {:>14} | {:>14} | {:>6} | {:>6}\n",
            s.order,
            truncate(&s.name, 40),
            s.formatted_average_duration(),
            s.formatted_shortest_duration(),
            s.formatted_longest_duration(),
            s.passed_builds(),
            s.failed_builds(),
        ));
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    }
}

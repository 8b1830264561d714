//! Human-readable durations and name lists for narrative lines.

/// `"N days, HH:MM:SS"`. Negative input renders as zero.
pub fn duration(secs: i64) -> String {
    let secs = secs.max(0);
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    let unit = if days == 1 { "day" } else { "days" };
    format!("{days} {unit}, {hours:02}:{minutes:02}:{seconds:02}")
}

/// `"a"`, `"a and b"`, `"a, b, and c"`.
pub fn name_list(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [a, b] => format!("{a} and {b}"),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
}

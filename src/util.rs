use chrono::{DateTime, Utc};

/// Expands a leading `~` in a path to the user's home directory.
/// Also normalizes path separators for the current OS.
pub fn expand_tilde(path: &str) -> String {
    let result = if path.starts_with("~/") || path == "~" {
        if let Some(home) = dirs::home_dir() {
            let rest = &path[1..]; // "/.roboscript/logs"
            home.join(rest.trim_start_matches('/'))
                .to_string_lossy()
                .to_string()
        } else {
            path.to_string()
        }
    } else {
        path.to_string()
    };
    // Normalize separators for the current OS
    if cfg!(windows) {
        result.replace('/', "\\")
    } else {
        result
    }
}

/// Trim a form value and map an empty result to `None`.
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Compact counter display: `999`, `1.2K`, `3.4M`.
pub fn format_count(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Relative age in whole minutes, hours or days (`5m ago`, `3h ago`, `2d ago`).
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - created_at).num_minutes().max(0);
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}

/// Long date used on the detail page, e.g. `June 15, 2025`.
pub fn format_long_date(at: DateTime<Utc>) -> String {
    at.format("%B %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  pastebin  "), Some("pastebin".into()));
        assert_eq!(non_empty("   "), None);
        assert_eq!(non_empty(""), None);
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1234), "1.2K");
        assert_eq!(format_count(15678), "15.7K");
        assert_eq!(format_count(3_400_000), "3.4M");
    }

    #[test]
    fn test_time_ago_buckets() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        assert_eq!(time_ago(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(time_ago(now - Duration::hours(3), now), "3h ago");
        assert_eq!(time_ago(now - Duration::days(2), now), "2d ago");
        // Clock skew never produces negative ages
        assert_eq!(time_ago(now + Duration::minutes(2), now), "0m ago");
    }

    #[test]
    fn test_format_long_date() {
        let at = Utc.with_ymd_and_hms(2025, 6, 5, 10, 30, 0).unwrap();
        assert_eq!(format_long_date(at), "June 5, 2025");
    }

    #[test]
    fn test_expand_tilde_passthrough() {
        let expected = if cfg!(windows) { "relative\\logs" } else { "relative/logs" };
        assert_eq!(expand_tilde("relative/logs"), expected);
    }
}

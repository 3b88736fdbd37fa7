use chrono::{DateTime, Local};

/// Maximum characters in one chat message.
pub const MESSAGE_LIMIT: usize = 2000;

/// Truncate a message to at most `max_chars` characters, marking the cut
/// with an ellipsis when there is room for one.
pub fn truncate_message(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else if max_chars <= 3 {
        s.chars().take(max_chars).collect()
    } else {
        let truncated: String = s.chars().take(max_chars - 3).collect();
        format!("{}...", truncated)
    }
}

/// Timestamp used in bot log posts, e.g. "2025-06-14 18:03".
pub fn format_timestamp(time: DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("Hello", 10), "Hello");
        assert_eq!(truncate_message("Hello World", 8), "Hello...");
        assert_eq!(truncate_message("Hi", 2), "Hi");
        assert_eq!(truncate_message("abcdef", 2), "ab");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let s = "✅".repeat(MESSAGE_LIMIT);
        assert_eq!(truncate_message(&s, MESSAGE_LIMIT), s);
        let longer = "✅".repeat(MESSAGE_LIMIT + 1);
        assert_eq!(truncate_message(&longer, MESSAGE_LIMIT).chars().count(), MESSAGE_LIMIT);
    }

    #[test]
    fn test_format_timestamp() {
        let t = Local.with_ymd_and_hms(2025, 6, 14, 18, 3, 0).unwrap();
        assert_eq!(format_timestamp(t), "2025-06-14 18:03");
    }
}

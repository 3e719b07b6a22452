//! Output and color utilities for consistent terminal formatting
//!
//! Provides shared color functions respecting NO_COLOR environment variable.

use colored::Colorize;

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Colorize file path (cyan)
pub fn colorize_path(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize a count (yellow)
pub fn colorize_count(num: usize, use_color: bool) -> String {
    if use_color {
        num.to_string().yellow().to_string()
    } else {
        num.to_string()
    }
}

/// Success marker (green check)
pub fn success_mark(use_color: bool) -> String {
    if use_color {
        "✓".green().to_string()
    } else {
        "✓".to_string()
    }
}

/// Colorize a warning line (red bold)
pub fn colorize_warning(text: &str, use_color: bool) -> String {
    if use_color {
        text.red().bold().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize secondary details (dimmed)
pub fn colorize_dimmed(text: &str, use_color: bool) -> String {
    if use_color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_without_color() {
        assert_eq!(colorize_path("a/b.txt", false), "a/b.txt");
        assert_eq!(colorize_count(42, false), "42");
        assert_eq!(success_mark(false), "✓");
        assert_eq!(colorize_warning("oops", false), "oops");
        assert_eq!(colorize_dimmed("meh", false), "meh");
    }
}

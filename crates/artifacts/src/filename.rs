//! Deterministic screenshot filenames (§4.7):
//! `{domain-no-www-no-tld}_{sanitized-title-max-30}_{yyyymmdd_hhmm}.png`

use chrono::{DateTime, Utc};

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_TITLE_LEN: usize = 30;
const MAX_FILENAME_LEN: usize = 100;

/// Strips the scheme, `www.` prefix, and top-level domain from a host or
/// URL-like string, leaving the registrable-name portion.
pub fn domain_stem(url_or_host: &str) -> String {
    let without_scheme = url_or_host.split("://").last().unwrap_or(url_or_host);
    let host = without_scheme.split(['/', '?', '#']).next().unwrap_or(without_scheme);
    let host = host.strip_prefix("www.").unwrap_or(host);
    let mut parts: Vec<&str> = host.split('.').collect();
    if parts.len() > 1 {
        parts.pop();
    }
    let stem = parts.join("_");
    if stem.is_empty() {
        "unknown".to_owned()
    } else {
        stem
    }
}

/// Sanitizes a page title for filesystem use: replaces forbidden and
/// control characters with `_`, collapses runs, trims edges, caps length.
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| if FORBIDDEN.contains(&c) || c.is_control() { '_' } else { c })
        .collect();

    let mut collapsed = String::with_capacity(replaced.len());
    let mut last_was_underscore = false;
    for c in replaced.chars() {
        if c == '_' {
            if !last_was_underscore {
                collapsed.push(c);
            }
            last_was_underscore = true;
        } else {
            collapsed.push(c);
            last_was_underscore = false;
        }
    }

    let trimmed = collapsed.trim_matches('_');
    let capped: String = trimmed.chars().take(MAX_TITLE_LEN).collect();
    if capped.is_empty() {
        "untitled".to_owned()
    } else {
        capped
    }
}

/// Builds the final filename, capping the overall length per §4.7.
pub fn build_filename(url_or_host: &str, page_title: &str, captured_at: DateTime<Utc>) -> String {
    let domain = domain_stem(url_or_host);
    let title = sanitize_title(page_title);
    let timestamp = captured_at.format("%Y%m%d_%H%M");
    let name = format!("{domain}_{title}_{timestamp}.png");
    if name.len() <= MAX_FILENAME_LEN {
        name
    } else {
        let keep = MAX_FILENAME_LEN.saturating_sub(".png".len());
        let mut truncated: String = name.chars().take(keep).collect();
        truncated.push_str(".png");
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 14, 7, 0).unwrap()
    }

    #[test]
    fn domain_stem_strips_scheme_www_and_tld() {
        assert_eq!(domain_stem("https://www.example.com/page"), "example");
        assert_eq!(domain_stem("linkedin.com"), "linkedin");
    }

    #[test]
    fn domain_stem_handles_no_tld() {
        assert_eq!(domain_stem("localhost"), "localhost");
    }

    #[test]
    fn sanitize_title_replaces_forbidden_chars() {
        assert_eq!(sanitize_title("Results: \"Rust\" / jobs"), "Results_Rust_jobs");
    }

    #[test]
    fn sanitize_title_collapses_and_trims_underscores() {
        assert_eq!(sanitize_title("__weird***title__"), "weird_title");
    }

    #[test]
    fn sanitize_title_caps_at_thirty_chars() {
        let long = "a".repeat(50);
        assert_eq!(sanitize_title(&long).len(), 30);
    }

    #[test]
    fn sanitize_title_empty_becomes_untitled() {
        assert_eq!(sanitize_title("///"), "untitled");
    }

    #[test]
    fn build_filename_matches_expected_shape() {
        let name = build_filename("https://www.linkedin.com/jobs", "Software Engineer Jobs", ts());
        assert_eq!(name, "linkedin_Software Engineer Jobs_20260801_1407.png");
    }

    #[test]
    fn build_filename_caps_total_length() {
        let long_title = "x".repeat(30);
        let name = build_filename("https://www.example.com", &long_title, ts());
        assert!(name.len() <= 100);
        assert!(name.ends_with(".png"));
    }
}

//! URL-to-rule matching.
//!
//! A pattern without `/` is a domain rule: it matches the hostname itself and
//! every subdomain, ignoring a leading `www.` on either side. A pattern with
//! `/` is a path rule and matches as a literal substring of the full URL.

use url::Url;

/// Returns true when `candidate_url` is covered by `pattern`.
///
/// A URL that fails to parse never matches.
pub fn matches(candidate_url: &str, pattern: &str) -> bool {
    let Ok(parsed) = Url::parse(candidate_url) else {
        return false;
    };

    if is_path_rule(pattern) {
        return candidate_url.contains(pattern);
    }

    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = strip_www(host);
    let domain = strip_www(pattern);

    if domain.is_empty() {
        return false;
    }

    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Path rules target a specific page rather than a whole domain.
pub fn is_path_rule(pattern: &str) -> bool {
    pattern.contains('/')
}

pub(crate) fn strip_www(s: &str) -> &str {
    s.strip_prefix("www.").unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn domain_rule_matches_exact_host() {
        assert!(matches("https://example.com/page", "example.com"));
        assert!(matches("http://example.com", "example.com"));
    }

    #[test]
    fn domain_rule_matches_subdomains() {
        assert!(matches("https://sub.example.com/page", "example.com"));
        assert!(matches("https://a.b.example.com", "example.com"));
    }

    #[test]
    fn domain_rule_ignores_www_on_both_sides() {
        assert!(matches("https://www.example.com", "example.com"));
        assert!(matches("https://example.com", "www.example.com"));
        assert!(matches("https://www.example.com", "www.example.com"));
    }

    #[test]
    fn domain_rule_rejects_lookalike_suffix() {
        assert!(!matches("https://notexample.com", "example.com"));
        assert!(!matches("https://example.org", "example.com"));
        assert!(!matches("https://example.com.evil.net", "example.com"));
    }

    #[test]
    fn path_rule_is_literal_substring() {
        assert!(matches(
            "https://reddit.com/r/rust/comments",
            "reddit.com/r/rust"
        ));
        assert!(!matches("https://reddit.com/r/golang", "reddit.com/r/rust"));
        // No www normalization for path rules.
        assert!(!matches("https://www.reddit.com/r/rust", "reddit.com/r/rust/x"));
    }

    #[test]
    fn malformed_url_never_matches() {
        assert!(!matches("not a url", "example.com"));
        assert!(!matches("", "example.com"));
        assert!(!matches("not a url/example.com/", "example.com/"));
    }

    #[test]
    fn hostless_url_never_matches_domain_rule() {
        assert!(!matches("about:blank", "blank"));
    }

    fn label() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9]{0,8}"
    }

    proptest! {
        #[test]
        fn subdomain_of_rule_always_matches(
            sub in label(),
            name in label(),
            tld in "(com|org|net)",
            www_host in any::<bool>(),
            www_rule in any::<bool>(),
        ) {
            let domain = format!("{name}.{tld}");
            let host = format!("{}{sub}.{domain}", if www_host { "www." } else { "" });
            let rule = format!("{}{domain}", if www_rule { "www." } else { "" });
            let url = format!("https://{host}/x");
            prop_assert!(matches(&url, &rule));
        }

        #[test]
        fn unrelated_domain_never_matches(
            a in label(),
            b in label(),
        ) {
            let suffix = format!(".{b}");
            prop_assume!(a != b && !a.ends_with(&suffix));
            let url = format!("https://{a}.com/x");
            let rule = format!("{b}.com");
            prop_assert!(!matches(&url, &rule));
        }

        #[test]
        fn path_rule_matches_iff_substring(
            host in label(),
            path in "[a-z/]{0,12}",
            rule_path in "[a-z]{1,6}",
        ) {
            let url = format!("https://{host}.com/{path}");
            let rule = format!("{host}.com/{rule_path}");
            prop_assert_eq!(matches(&url, &rule), url.contains(&rule));
        }
    }
}

//! Static allow-list checks: CORS origin policy, shared access codes and
//! the verified-session requirement.
//!
//! The three checks are independent; the origin check runs first because it
//! is the cheapest and the most decisive (a denied origin short-circuits
//! everything else, including the rate limiter).

use std::collections::HashSet;

use crate::crypto::constant_time_eq;

/// How the gateway answers cross-origin callers.
#[derive(Debug, Clone)]
pub enum OriginPolicy {
    /// Any origin is allowed; the CORS header is the literal `*`.
    Any,
    /// Only the listed origins are allowed; the matching origin is echoed.
    Only(HashSet<String>),
}

/// Outcome of resolving a request's Origin header against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// Cross-origin and allowed; carry this `Access-Control-Allow-Origin`.
    Allowed(String),
    /// No Origin header: same-origin or a non-browser caller. Always passes
    /// this stage; no CORS header needed.
    NotBrowser,
    /// Cross-origin and not on the allow-list. Reject before any other work.
    Denied,
}

impl OriginPolicy {
    /// Parse the configured policy: `*` (or empty) is wildcard, otherwise a
    /// comma-separated origin list.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Self::Any;
        }
        Self::Only(
            trimmed
                .split(',')
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        )
    }

    pub fn resolve(&self, origin: Option<&str>) -> OriginDecision {
        let Some(origin) = origin.map(str::trim).filter(|o| !o.is_empty()) else {
            return OriginDecision::NotBrowser;
        };
        match self {
            Self::Any => OriginDecision::Allowed("*".into()),
            Self::Only(allowed) => {
                if allowed.contains(origin.trim_end_matches('/')) {
                    OriginDecision::Allowed(origin.to_string())
                } else {
                    OriginDecision::Denied
                }
            }
        }
    }
}

/// Match a presented access code against the configured set, in constant
/// time per candidate. An empty set means the check is disabled.
pub fn access_code_ok(configured: &[String], presented: Option<&str>) -> bool {
    if configured.is_empty() {
        return true;
    }
    let Some(presented) = presented.map(str::trim).filter(|c| !c.is_empty()) else {
        return false;
    };
    configured.iter().any(|c| constant_time_eq(c, presented))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_allows_any_origin() {
        let policy = OriginPolicy::parse("*");
        assert_eq!(
            policy.resolve(Some("https://evil.example")),
            OriginDecision::Allowed("*".into())
        );
    }

    #[test]
    fn empty_config_means_wildcard() {
        assert!(matches!(OriginPolicy::parse(""), OriginPolicy::Any));
        assert!(matches!(OriginPolicy::parse("  "), OriginPolicy::Any));
    }

    #[test]
    fn explicit_policy_echoes_matching_origin() {
        let policy = OriginPolicy::parse("https://a.example");
        assert_eq!(
            policy.resolve(Some("https://a.example")),
            OriginDecision::Allowed("https://a.example".into())
        );
    }

    #[test]
    fn explicit_policy_denies_other_origins() {
        let policy = OriginPolicy::parse("https://a.example");
        assert_eq!(
            policy.resolve(Some("https://b.example")),
            OriginDecision::Denied
        );
    }

    #[test]
    fn comma_separated_list_allows_each_entry() {
        let policy = OriginPolicy::parse("https://a.example, https://b.example");
        assert_eq!(
            policy.resolve(Some("https://b.example")),
            OriginDecision::Allowed("https://b.example".into())
        );
        assert_eq!(
            policy.resolve(Some("https://c.example")),
            OriginDecision::Denied
        );
    }

    #[test]
    fn missing_origin_always_passes() {
        let policy = OriginPolicy::parse("https://a.example");
        assert_eq!(policy.resolve(None), OriginDecision::NotBrowser);
        assert_eq!(policy.resolve(Some("")), OriginDecision::NotBrowser);
    }

    #[test]
    fn trailing_slash_is_tolerated() {
        let policy = OriginPolicy::parse("https://a.example/");
        assert_eq!(
            policy.resolve(Some("https://a.example")),
            OriginDecision::Allowed("https://a.example".into())
        );
    }

    #[test]
    fn no_codes_configured_disables_the_check() {
        assert!(access_code_ok(&[], None));
        assert!(access_code_ok(&[], Some("anything")));
    }

    #[test]
    fn matching_code_passes() {
        let codes = vec!["alpha".to_string(), "beta".to_string()];
        assert!(access_code_ok(&codes, Some("beta")));
        assert!(access_code_ok(&codes, Some(" alpha ")));
    }

    #[test]
    fn wrong_or_missing_code_fails() {
        let codes = vec!["alpha".to_string()];
        assert!(!access_code_ok(&codes, Some("gamma")));
        assert!(!access_code_ok(&codes, None));
        assert!(!access_code_ok(&codes, Some("")));
    }
}

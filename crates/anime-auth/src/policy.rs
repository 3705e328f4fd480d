//! Route access policy
//!
//! Maps a request method and path to the access it requires. Policies are
//! evaluated in declaration order and the first match wins, so more
//! specific patterns must be declared before broader ones.

use anime_db::normalize_role;
use axum::http::Method;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::AuthError;

/// Maximum iterations allowed for pattern matching
const MAX_MATCH_ITERATIONS: usize = 10000;

/// Access required by a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// No credentials needed
    Any,
    /// Any verified user
    Authenticated,
    /// Verified user holding this role
    Role(String),
    /// Nobody, not even verified users
    Deny,
}

impl Access {
    pub fn role(label: &str) -> Result<Self, AuthError> {
        normalize_role(label)
            .map(Access::Role)
            .map_err(|e| AuthError::PolicyMisconfiguration(e.to_string()))
    }
}

impl FromStr for Access {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ANY" | "PERMIT_ALL" | "PERMITALL" => Ok(Access::Any),
            "AUTHENTICATED" | "NONE" => Ok(Access::Authenticated),
            "DENY" | "DENY_ALL" | "DENYALL" => Ok(Access::Deny),
            _ => Access::role(s),
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Any => f.write_str("ANY"),
            Access::Authenticated => f.write_str("AUTHENTICATED"),
            Access::Role(role) => f.write_str(role),
            Access::Deny => f.write_str("DENY"),
        }
    }
}

/// One entry of the policy list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    pub pattern: String,
    /// Restrict the entry to one method; `None` matches every method
    pub method: Option<Method>,
    pub access: Access,
}

impl RoutePolicy {
    pub fn new(pattern: impl Into<String>, access: Access) -> Self {
        Self {
            pattern: pattern.into(),
            method: None,
            access,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternPart {
    /// Segment that must match exactly
    Literal(String),
    /// Segment containing `*`, matched within the segment
    Glob(String),
    /// Exactly one segment (*)
    SingleWildcard,
    /// Zero or more segments (**)
    MultiWildcard,
}

#[derive(Debug, Clone)]
struct CompiledPolicy {
    policy: RoutePolicy,
    parts: Vec<PatternPart>,
}

impl CompiledPolicy {
    fn is_catch_all(&self) -> bool {
        self.policy.method.is_none() && self.parts == [PatternPart::MultiWildcard]
    }
}

/// Ordered, immutable list of route policies
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    policies: Vec<CompiledPolicy>,
}

impl AccessPolicy {
    /// Compile a policy list, keeping declaration order
    pub fn new(policies: Vec<RoutePolicy>) -> Self {
        let policies: Vec<CompiledPolicy> = policies
            .into_iter()
            .map(|policy| CompiledPolicy {
                parts: Self::compile_pattern(&policy.pattern),
                policy,
            })
            .collect();

        let policy = Self { policies };
        if !policy.has_fallback() {
            warn!("Access policy has no catch-all entry; unmatched routes will require authentication");
        }
        policy
    }

    /// Whether some entry matches every request
    pub fn has_fallback(&self) -> bool {
        self.policies.iter().any(CompiledPolicy::is_catch_all)
    }

    /// Reject policy lists without a catch-all entry
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.has_fallback() {
            Ok(())
        } else {
            Err(AuthError::PolicyMisconfiguration(
                "policy list needs a catch-all entry such as \"*\" or \"/**\"".to_string(),
            ))
        }
    }

    pub fn policies(&self) -> impl Iterator<Item = &RoutePolicy> {
        self.policies.iter().map(|c| &c.policy)
    }

    /// First policy matching the request, if any
    pub fn find_match(&self, method: &Method, path: &str) -> Option<&RoutePolicy> {
        let normalized = normalize_path(path);
        let segments: Vec<&str> = split_segments(&normalized).collect();

        self.policies
            .iter()
            .filter(|c| c.policy.method.as_ref().is_none_or(|m| m == method))
            .find(|c| Self::matches_pattern(&c.parts, &segments))
            .map(|c| &c.policy)
    }

    /// Access required for a request
    ///
    /// Fails closed: when nothing matches, authentication is required.
    pub fn required_role(&self, method: &Method, path: &str) -> Access {
        match self.find_match(method, path) {
            Some(policy) => policy.access.clone(),
            None => {
                warn!(
                    "{}",
                    AuthError::PolicyMisconfiguration(format!(
                        "no policy matches {} {}, requiring authentication",
                        method, path
                    ))
                );
                Access::Authenticated
            }
        }
    }

    /// Compile a pattern into per-segment parts
    fn compile_pattern(pattern: &str) -> Vec<PatternPart> {
        let trimmed = pattern.trim();
        if matches!(trimmed, "*" | "**" | "/**") {
            return vec![PatternPart::MultiWildcard];
        }

        split_segments(trimmed)
            .map(|segment| match segment {
                "**" => PatternPart::MultiWildcard,
                "*" => PatternPart::SingleWildcard,
                s if s.contains('*') => PatternPart::Glob(s.to_string()),
                s => PatternPart::Literal(s.to_string()),
            })
            .collect()
    }

    fn matches_pattern(parts: &[PatternPart], segments: &[&str]) -> bool {
        let mut iterations = 0;
        Self::match_recursive(parts, segments, &mut iterations)
    }

    fn match_recursive(parts: &[PatternPart], segments: &[&str], iterations: &mut usize) -> bool {
        *iterations += 1;
        if *iterations > MAX_MATCH_ITERATIONS {
            if *iterations == MAX_MATCH_ITERATIONS + 1 {
                warn!(
                    "Pattern matching exceeded {} iterations, aborting",
                    MAX_MATCH_ITERATIONS
                );
            }
            return false;
        }

        let Some((part, rest)) = parts.split_first() else {
            return segments.is_empty();
        };

        match part {
            PatternPart::MultiWildcard => {
                if rest.is_empty() {
                    return true;
                }
                (0..=segments.len())
                    .any(|skip| Self::match_recursive(rest, &segments[skip..], iterations))
            }
            _ => match segments.split_first() {
                Some((segment, remaining)) => {
                    Self::matches_segment(part, segment)
                        && Self::match_recursive(rest, remaining, iterations)
                }
                None => false,
            },
        }
    }

    fn matches_segment(part: &PatternPart, segment: &str) -> bool {
        match part {
            PatternPart::Literal(lit) => lit == segment,
            PatternPart::Glob(glob) => glob_segment(glob, segment),
            PatternPart::SingleWildcard => true,
            PatternPart::MultiWildcard => true,
        }
    }
}

impl Default for AccessPolicy {
    /// `/animes/admin/**` ADMIN, `/animes/**` USER, `/actuator/**` open,
    /// everything else authenticated
    fn default() -> Self {
        Self::new(vec![
            RoutePolicy::new("/animes/admin/**", Access::Role(anime_db::ROLE_ADMIN.to_string())),
            RoutePolicy::new("/animes/**", Access::Role(anime_db::ROLE_USER.to_string())),
            RoutePolicy::new("/actuator/**", Access::Any),
            RoutePolicy::new("*", Access::Authenticated),
        ])
    }
}

/// Canonical form of a request path
///
/// Drops the query string and fragment and collapses repeated and trailing
/// slashes. `.` and `..` segments are kept as they are, since the router
/// dispatches on them unresolved; requests carrying them are refused by
/// [`has_dot_segment`] before any policy is consulted.
pub fn normalize_path(raw: &str) -> String {
    let path = raw.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = split_segments(path).collect();
    format!("/{}", segments.join("/"))
}

/// Whether a path has a `.` or `..` segment, plain or percent-encoded
pub fn has_dot_segment(raw: &str) -> bool {
    let path = raw.split(['?', '#']).next().unwrap_or_default();
    split_segments(path).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Match a single segment against a pattern where `*` spans any characters
fn glob_segment(pattern: &str, segment: &str) -> bool {
    let pieces: Vec<&str> = pattern.split('*').collect();
    let (first, last) = (pieces[0], pieces[pieces.len() - 1]);

    if !segment.starts_with(first) {
        return false;
    }

    let mut pos = first.len();
    for piece in &pieces[1..pieces.len() - 1] {
        match segment[pos..].find(piece) {
            Some(idx) => pos += idx + piece.len(),
            None => return false,
        }
    }

    segment.len() >= pos + last.len() && segment[pos..].ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str) -> Access {
        Access::Role(name.to_string())
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/animes"), "/animes");
        assert_eq!(normalize_path("/animes/"), "/animes");
        assert_eq!(normalize_path("/animes///"), "/animes");
        assert_eq!(normalize_path("//animes//admin/5"), "/animes/admin/5");
        assert_eq!(normalize_path("/animes/find?name=dbz"), "/animes/find");
        assert_eq!(normalize_path("/animes/?page=2#top"), "/animes");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("animes"), "/animes");
        assert_eq!(normalize_path("/animes/admin/.."), "/animes/admin/..");
    }

    #[test]
    fn test_has_dot_segment() {
        assert!(has_dot_segment("/animes/admin/.."));
        assert!(has_dot_segment("/animes/./admin/1"));
        assert!(has_dot_segment("/animes/admin/%2E%2e"));
        assert!(has_dot_segment("/animes/admin/.%2e?x=1"));

        assert!(!has_dot_segment("/animes/admin/5"));
        assert!(!has_dot_segment("/animes/find?name=.."));
        assert!(!has_dot_segment("/animes/..."));
        assert!(!has_dot_segment("/animes/v1.json"));
    }

    #[test]
    fn test_dot_segments_are_not_resolved() {
        let policy = AccessPolicy::default();
        // Matched as written, never as the parent /animes
        assert_eq!(policy.required_role(&Method::DELETE, "/animes/admin/.."), role("ADMIN"));
    }

    #[test]
    fn test_exact_match() {
        let policy = AccessPolicy::new(vec![RoutePolicy::new("/animes/all", role("USER"))]);

        assert!(policy.find_match(&Method::GET, "/animes/all").is_some());
        assert!(policy.find_match(&Method::GET, "/animes/all/").is_some());
        assert!(policy.find_match(&Method::GET, "/animes").is_none());
        assert!(policy.find_match(&Method::GET, "/animes/all/x").is_none());
    }

    #[test]
    fn test_single_wildcard() {
        let policy = AccessPolicy::new(vec![RoutePolicy::new("/animes/*", role("USER"))]);

        assert!(policy.find_match(&Method::GET, "/animes/5").is_some());
        assert!(policy.find_match(&Method::GET, "/animes/find").is_some());

        // Exactly one more segment
        assert!(policy.find_match(&Method::GET, "/animes").is_none());
        assert!(policy.find_match(&Method::GET, "/animes/admin/5").is_none());
    }

    #[test]
    fn test_multi_wildcard() {
        let policy = AccessPolicy::new(vec![RoutePolicy::new("/animes/**", role("USER"))]);

        assert!(policy.find_match(&Method::GET, "/animes").is_some());
        assert!(policy.find_match(&Method::GET, "/animes/").is_some());
        assert!(policy.find_match(&Method::GET, "/animes/5").is_some());
        assert!(policy.find_match(&Method::GET, "/animes/admin/5").is_some());

        assert!(policy.find_match(&Method::GET, "/animesx").is_none());
        assert!(policy.find_match(&Method::GET, "/users").is_none());
    }

    #[test]
    fn test_wildcard_in_middle_and_glob_segment() {
        let policy = AccessPolicy::new(vec![
            RoutePolicy::new("/api/**/export", role("ADMIN")),
            RoutePolicy::new("/v*/status", Access::Any),
        ]);

        assert_eq!(policy.required_role(&Method::GET, "/api/export"), role("ADMIN"));
        assert_eq!(policy.required_role(&Method::GET, "/api/a/b/export"), role("ADMIN"));
        assert_eq!(policy.required_role(&Method::GET, "/v1/status"), Access::Any);
        assert_eq!(policy.required_role(&Method::GET, "/v/status"), Access::Any);
        assert!(policy.find_match(&Method::GET, "/x1/status").is_none());
    }

    #[test]
    fn test_glob_segment() {
        assert!(glob_segment("v*", "v1"));
        assert!(glob_segment("*.json", "animes.json"));
        assert!(glob_segment("a*b*c", "aXXbYYc"));
        assert!(!glob_segment("a*b*c", "aXXcYYb"));
        assert!(!glob_segment("ab*ba", "aba"));
    }

    #[test]
    fn test_default_policy_first_match_wins() {
        let policy = AccessPolicy::default();
        assert!(policy.has_fallback());

        // Matches both admin and general anime entries, admin is declared first
        assert_eq!(policy.required_role(&Method::GET, "/animes/admin/5"), role("ADMIN"));
        assert_eq!(policy.required_role(&Method::DELETE, "/animes/admin/x"), role("ADMIN"));
        assert_eq!(policy.required_role(&Method::GET, "/animes/admin"), role("ADMIN"));

        assert_eq!(policy.required_role(&Method::GET, "/animes"), role("USER"));
        assert_eq!(policy.required_role(&Method::GET, "/animes/find?name=x"), role("USER"));
        assert_eq!(policy.required_role(&Method::GET, "/actuator/health"), Access::Any);
        assert_eq!(policy.required_role(&Method::GET, "/users/me"), Access::Authenticated);
        assert_eq!(policy.required_role(&Method::GET, "/"), Access::Authenticated);
    }

    #[test]
    fn test_declaration_order_not_specificity() {
        // Broad entry first shadows the admin entry
        let policy = AccessPolicy::new(vec![
            RoutePolicy::new("/animes/**", role("USER")),
            RoutePolicy::new("/animes/admin/**", role("ADMIN")),
            RoutePolicy::new("*", Access::Authenticated),
        ]);

        assert_eq!(policy.required_role(&Method::GET, "/animes/admin/5"), role("USER"));
    }

    #[test]
    fn test_method_specific_entries() {
        let policy = AccessPolicy::new(vec![
            RoutePolicy::new("/animes/**", role("ADMIN")).with_method(Method::DELETE),
            RoutePolicy::new("/animes/**", role("USER")),
            RoutePolicy::new("/**", Access::Authenticated),
        ]);

        assert_eq!(policy.required_role(&Method::DELETE, "/animes/1"), role("ADMIN"));
        assert_eq!(policy.required_role(&Method::GET, "/animes/1"), role("USER"));
    }

    #[test]
    fn test_fails_closed_without_fallback() {
        let policy = AccessPolicy::new(vec![RoutePolicy::new("/actuator/**", Access::Any)]);

        assert!(!policy.has_fallback());
        assert!(matches!(
            policy.validate(),
            Err(AuthError::PolicyMisconfiguration(_))
        ));
        assert_eq!(policy.required_role(&Method::GET, "/secret"), Access::Authenticated);
        assert_eq!(policy.required_role(&Method::GET, "/actuator/health"), Access::Any);
    }

    #[test]
    fn test_method_restricted_catch_all_is_not_a_fallback() {
        let policy = AccessPolicy::new(vec![
            RoutePolicy::new("/**", Access::Authenticated).with_method(Method::GET),
        ]);
        assert!(!policy.has_fallback());
    }

    #[test]
    fn test_access_from_str() {
        assert_eq!("any".parse::<Access>().unwrap(), Access::Any);
        assert_eq!("permit_all".parse::<Access>().unwrap(), Access::Any);
        assert_eq!("AUTHENTICATED".parse::<Access>().unwrap(), Access::Authenticated);
        assert_eq!("NONE".parse::<Access>().unwrap(), Access::Authenticated);
        assert_eq!("deny".parse::<Access>().unwrap(), Access::Deny);
        assert_eq!("ROLE_ADMIN".parse::<Access>().unwrap(), role("ADMIN"));
        assert_eq!("user".parse::<Access>().unwrap(), role("USER"));
        assert!("two words".parse::<Access>().is_err());
    }

    #[test]
    fn test_pathological_pattern_terminates() {
        let pattern = "/**/a/**/a/**/a/**/a/**/a/**/b";
        let policy = AccessPolicy::new(vec![RoutePolicy::new(pattern, Access::Deny)]);
        let path = format!("/{}", vec!["a"; 40].join("/"));

        assert!(policy.find_match(&Method::GET, &path).is_none());
    }
}

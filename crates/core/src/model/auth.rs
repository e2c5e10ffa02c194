use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthError {
    #[error("access token is not a valid UUID")]
    Malformed,

    #[error("access token expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },
}

//
// ─── ACCESS TOKEN ──────────────────────────────────────────────────────────────
//

/// Capability-style credential identifying one student.
///
/// There are no passwords: whoever holds the token is the student. Tokens are
/// opaque UUIDs minted at student creation.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessToken(Uuid);

impl AccessToken {
    /// Mints a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Debug redacts the token so it never lands in logs verbatim.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0.to_string();
        write!(f, "AccessToken({}…)", &s[..8])
    }
}

impl FromStr for AccessToken {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(AccessToken)
            .map_err(|_| AuthError::Malformed)
    }
}

//
// ─── TOKEN POLICY ──────────────────────────────────────────────────────────────
//

/// Explicit expiry policy for access tokens.
///
/// Identity is always passed as a value into core operations; this policy is
/// the single place that decides whether a presented token is still usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenPolicy {
    max_age: Option<Duration>,
}

impl TokenPolicy {
    /// Tokens never expire.
    #[must_use]
    pub fn unlimited() -> Self {
        Self { max_age: None }
    }

    /// Tokens expire `max_age` after they were issued.
    #[must_use]
    pub fn expiring_after(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
        }
    }

    /// Check a token issued at `issued_at` against the current time.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Expired` if the token is older than the allowed age.
    pub fn validate(&self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), AuthError> {
        if let Some(max_age) = self.max_age {
            let expired_at = issued_at + max_age;
            if now > expired_at {
                return Err(AuthError::Expired { expired_at });
            }
        }
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn token_parses_back_from_its_display_form() {
        let token = AccessToken::generate();
        let parsed: AccessToken = token.as_str().parse().unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn malformed_token_is_rejected() {
        let err = "definitely-not-a-uuid".parse::<AccessToken>().unwrap_err();
        assert_eq!(err, AuthError::Malformed);
    }

    #[test]
    fn debug_redacts_token_body() {
        let token = AccessToken::generate();
        let debug = format!("{token:?}");
        assert!(!debug.contains(&token.as_str()));
    }

    #[test]
    fn unlimited_policy_accepts_old_tokens() {
        let policy = TokenPolicy::unlimited();
        let issued = fixed_now() - Duration::days(3650);
        assert!(policy.validate(issued, fixed_now()).is_ok());
    }

    #[test]
    fn expiring_policy_rejects_stale_tokens() {
        let policy = TokenPolicy::expiring_after(Duration::days(30));
        let issued = fixed_now() - Duration::days(31);
        let err = policy.validate(issued, fixed_now()).unwrap_err();
        assert!(matches!(err, AuthError::Expired { .. }));
    }

    #[test]
    fn expiring_policy_accepts_fresh_tokens() {
        let policy = TokenPolicy::expiring_after(Duration::days(30));
        let issued = fixed_now() - Duration::days(29);
        assert!(policy.validate(issued, fixed_now()).is_ok());
    }
}

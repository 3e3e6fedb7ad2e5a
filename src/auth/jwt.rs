//! Bearer token verification
//!
//! Validates HS256-signed ID tokens and extracts the caller's identity.
//! The token is issued by the external identity provider; habitd only
//! verifies it and reads the standard claims.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::types::{HabitError, Result};

/// A resolved, authenticated identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Email address - the stable key habits are owned by
    pub email: String,
    /// Display name, stamped onto habits at creation
    pub display_name: String,
    /// Provider-assigned subject identifier
    pub subject_id: String,
}

/// Claims carried by an ID token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier
    pub sub: String,
    /// Email address
    pub email: String,
    /// Display name (optional; falls back to the local part of the email)
    #[serde(default)]
    pub name: Option<String>,
    /// Expiry (unix seconds)
    pub exp: u64,
    /// Issued at (unix seconds)
    #[serde(default)]
    pub iat: u64,
    /// Issuer
    #[serde(default)]
    pub iss: Option<String>,
}

impl Claims {
    /// Resolve claims into an identity
    pub fn into_identity(self) -> Identity {
        let display_name = match self.name {
            Some(ref n) if !n.is_empty() => n.clone(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or(&self.email)
                .to_string(),
        };

        Identity {
            email: self.email,
            display_name,
            subject_id: self.sub,
        }
    }
}

/// Verifies bearer tokens against a shared secret
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and resolve the caller's identity
    pub fn verify(&self, token: &str) -> Result<Identity> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| HabitError::Auth(format!("Invalid or expired token: {}", e)))?;

        if data.claims.email.is_empty() {
            return Err(HabitError::Auth("Token has no email claim".into()));
        }

        Ok(data.claims.into_identity())
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn issue(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(email: &str, name: Option<&str>) -> Claims {
        Claims {
            sub: "uid-123".into(),
            email: email.into(),
            name: name.map(String::from),
            exp: (chrono::Utc::now().timestamp() + 3600) as u64,
            iat: chrono::Utc::now().timestamp() as u64,
            iss: None,
        }
    }

    #[test]
    fn test_verify_round_trip() {
        let verifier = TokenVerifier::new("secret", None);
        let token = issue("secret", &claims("alice@x.com", Some("Alice")));

        let identity = verifier.verify(&token).unwrap();
        assert_eq!(identity.email, "alice@x.com");
        assert_eq!(identity.display_name, "Alice");
        assert_eq!(identity.subject_id, "uid-123");
    }

    #[test]
    fn test_display_name_falls_back_to_email_local_part() {
        let verifier = TokenVerifier::new("secret", None);
        let token = issue("secret", &claims("bob@x.com", None));

        let identity = verifier.verify(&token).unwrap();
        assert_eq!(identity.display_name, "bob");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = TokenVerifier::new("secret", None);
        let token = issue("other-secret", &claims("alice@x.com", None));

        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = TokenVerifier::new("secret", None);
        let mut c = claims("alice@x.com", None);
        c.exp = (chrono::Utc::now().timestamp() - 600) as u64;
        let token = issue("secret", &c);

        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(
            extract_token_from_header(Some("Bearer abc.def.ghi")),
            Some("abc.def.ghi")
        );
        assert_eq!(extract_token_from_header(Some("Basic abc")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(None), None);
    }
}

//! Identity verification for `join`.
//!
//! Plaza doesn't issue credentials. Accounts are created elsewhere, and
//! that service hands clients an opaque credential. The presence server only
//! needs to turn that credential back into a stable [`AccountId`], which is
//! what the [`IdentityVerifier`] trait expresses.
//!
//! [`JwtVerifier`] is the production implementation: HS256-signed JSON Web
//! Tokens carrying the account id in a `userId` claim.

use std::future::Future;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use plaza_protocol::AccountId;
use serde::Deserialize;

use crate::SessionError;

/// Validates a client's credential and returns the account it belongs to.
///
/// # Trait bounds
///
/// - `Send + Sync` → one verifier is shared by every connection task.
/// - The returned future is `Send` because `join` awaits it inside a
///   spawned task, and may suspend there while other sessions make progress.
///
/// # Example
///
/// ```rust
/// use plaza_protocol::AccountId;
/// use plaza_session::{IdentityVerifier, SessionError};
///
/// /// Treats the credential itself as the account id.
/// /// Only for local development!
/// struct TrustingVerifier;
///
/// impl IdentityVerifier for TrustingVerifier {
///     async fn verify(&self, credential: &str) -> Result<AccountId, SessionError> {
///         if credential.is_empty() {
///             return Err(SessionError::AuthFailed("empty credential".into()));
///         }
///         Ok(AccountId::new(credential))
///     }
/// }
/// ```
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Returns the account id for a valid credential, or
    /// [`SessionError::AuthFailed`] otherwise.
    fn verify(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<AccountId, SessionError>> + Send;
}

/// Claims Plaza reads from a token. Everything else is ignored.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// Verifies HS256 JSON Web Tokens signed with a shared secret.
///
/// The account id comes from the `userId` claim. An `exp` claim is
/// enforced when present; tokens without one are accepted because the
/// account service issues them without expiry. An `aud` claim is not
/// checked.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Creates a verifier for tokens signed with `secret`.
    pub fn hs256(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> Result<AccountId, SessionError> {
        let data = jsonwebtoken::decode::<Claims>(credential, &self.key, &self.validation)
            .map_err(|e| SessionError::AuthFailed(e.to_string()))?;

        match data.claims.user_id {
            Some(id) if !id.is_empty() => Ok(AccountId::new(id)),
            _ => Err(SessionError::AuthFailed("token has no userId claim".into())),
        }
    }
}

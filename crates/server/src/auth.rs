//! Bearer-token sessions.
//!
//! Token issuance is out of scope; the server only needs to resolve an
//! incoming token to a [`Principal`]. [`StaticTokens`] serves grants from the
//! server config and is the implementation wired in by default.

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::config::TokenGrant;

/// The authenticated caller. `tenant_id` scopes every store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub tenant_id: String,
    pub is_admin: bool,
}

#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// `None` for unknown, revoked or expired tokens.
    async fn validate(&self, token: &str) -> Option<Principal>;
}

/// Fixed token list from configuration.
pub struct StaticTokens {
    grants: Vec<TokenGrant>,
}

impl StaticTokens {
    pub fn new(grants: Vec<TokenGrant>) -> Self {
        Self { grants }
    }
}

#[async_trait]
impl SessionValidator for StaticTokens {
    async fn validate(&self, token: &str) -> Option<Principal> {
        // Compare against every grant so timing does not reveal which one matched.
        let mut found = None;
        for grant in &self.grants {
            if bool::from(grant.token.as_bytes().ct_eq(token.as_bytes())) {
                found = Some(grant);
            }
        }
        found.map(|grant| Principal {
            user_id: grant.user_id.clone(),
            tenant_id: grant.tenant_id.clone(),
            is_admin: grant.is_admin,
        })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

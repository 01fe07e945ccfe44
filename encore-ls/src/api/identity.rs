//! Voter identity extractor
//!
//! Identity is established upstream (sign-in or an anonymous pseudonym held
//! by the client); the ledger only needs to know who is voting. Requests
//! without a user id are refused as unauthenticated.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use encore_common::votes::{NAME_HEADER, USER_HEADER};

use crate::error::ApiError;

/// Identified voter of the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voter {
    pub user_id: String,
    pub display_name: Option<String>,
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for Voter
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_HEADER).ok_or(ApiError::Unauthenticated)?;
        Ok(Voter {
            user_id,
            display_name: header_value(parts, NAME_HEADER),
        })
    }
}

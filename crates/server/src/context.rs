//! Request-scoped authorization context.
//!
//! Identity is established upstream; this layer only reads the organization
//! and user headers once and hands the result to each handler explicitly.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

pub const ORGANIZATION_HEADER: &str = "x-organization-id";
pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub organization_id: Uuid,
    pub user_id: Option<Uuid>,
}

impl RequestContext {
    pub fn new(organization_id: Uuid, user_id: Option<Uuid>) -> Self {
        Self {
            organization_id,
            user_id,
        }
    }

    pub fn from_parts(parts: &Parts) -> Result<Self, ApiError> {
        let organization_id = header_uuid(parts, ORGANIZATION_HEADER)?
            .ok_or_else(|| ApiError::Unauthorized("missing organization context".to_string()))?;
        let user_id = header_uuid(parts, USER_HEADER)?;
        Ok(Self::new(organization_id, user_id))
    }
}

fn header_uuid(parts: &Parts, name: &'static str) -> Result<Option<Uuid>, ApiError> {
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .map(Some)
        .ok_or_else(|| ApiError::Unauthorized(format!("invalid {name} header")))
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        RequestContext::from_parts(parts)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/clients");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_reads_organization_and_user() {
        let org = Uuid::new_v4();
        let user = Uuid::new_v4();
        let (org_header, user_header) = (org.to_string(), user.to_string());
        let ctx = RequestContext::from_parts(&parts(&[
            (ORGANIZATION_HEADER, org_header.as_str()),
            (USER_HEADER, user_header.as_str()),
        ]))
        .unwrap();
        assert_eq!(ctx, RequestContext::new(org, Some(user)));
    }

    #[test]
    fn test_user_is_optional() {
        let org = Uuid::new_v4().to_string();
        let ctx = RequestContext::from_parts(&parts(&[(ORGANIZATION_HEADER, org.as_str())]))
            .unwrap();
        assert_eq!(ctx.user_id, None);
    }

    #[test]
    fn test_missing_or_malformed_organization_is_unauthorized() {
        assert!(matches!(
            RequestContext::from_parts(&parts(&[])),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            RequestContext::from_parts(&parts(&[(ORGANIZATION_HEADER, "not-a-uuid")])),
            Err(ApiError::Unauthorized(_))
        ));
    }
}

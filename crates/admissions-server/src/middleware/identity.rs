//! Request identity adapter
//!
//! Authentication happens upstream. The gateway forwards the caller as
//! `x-user-*` headers; [`identity`] turns them into an [`AuthenticatedActor`]
//! extension unless an earlier layer already inserted one. Handlers guard on
//! [`ElevatedOperator`] or [`SuperAdminOperator`].
//!
//! [`client_ip`] resolves the caller's address once per request into a
//! [`ClientIp`] extension, the first source the delete audit consults.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use crate::audit::ActorSnapshot;
use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Caller roles, lowest privilege first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Staff,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The caller of the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedActor {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
    pub full_name: Option<String>,
}

impl AuthenticatedActor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            role,
            full_name: None,
        }
    }

    /// Read the forwarded identity headers; `None` without a user id
    ///
    /// A missing or unknown role degrades to [`Role::Student`].
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let user_id = header(USER_ID_HEADER)?;
        let role = header(USER_ROLE_HEADER)
            .and_then(|r| r.parse().ok())
            .unwrap_or(Role::Student);

        Some(Self {
            user_id,
            email: header(USER_EMAIL_HEADER),
            role,
            full_name: header(USER_NAME_HEADER),
        })
    }

    /// Frozen copy stored on audit records
    pub fn snapshot(&self) -> ActorSnapshot {
        ActorSnapshot {
            user_id: Some(self.user_id.clone()),
            email: self.email.clone(),
            role: Some(self.role.to_string()),
            full_name: self.full_name.clone(),
        }
    }
}

/// Client address as resolved by a trusted proxy-aware layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Attach the forwarded identity to the request
pub async fn identity(mut request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthenticatedActor>().is_none() {
        if let Some(actor) = AuthenticatedActor::from_headers(request.headers()) {
            tracing::debug!(user_id = %actor.user_id, role = %actor.role, "Request identity resolved");
            request.extensions_mut().insert(actor);
        }
    }
    next.run(request).await
}

/// Resolve the client address into a [`ClientIp`] extension
///
/// With `trust_proxy` the leftmost parseable `X-Forwarded-For` entry wins,
/// otherwise the socket peer. Without either nothing is inserted and the
/// audit falls back to the raw headers.
pub async fn client_ip(
    State(trust_proxy): State<bool>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<ClientIp>().is_none() {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        if let Some(ip) = resolve_client_addr(trust_proxy, request.headers(), peer) {
            request.extensions_mut().insert(ClientIp(ip));
        }
    }
    next.run(request).await
}

fn resolve_client_addr(
    trust_proxy: bool,
    headers: &HeaderMap,
    peer: Option<IpAddr>,
) -> Option<IpAddr> {
    let forwarded = trust_proxy
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse::<IpAddr>().ok());
    forwarded.or(peer)
}

fn require_role(parts: &Parts, minimum: Role) -> Result<AuthenticatedActor, AppError> {
    let actor = parts
        .extensions
        .get::<AuthenticatedActor>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    if actor.role < minimum {
        tracing::warn!(
            user_id = %actor.user_id,
            role = %actor.role,
            required = %minimum,
            "Insufficient privilege for audit API"
        );
        return Err(AppError::Forbidden(format!("Requires {} privilege", minimum)));
    }

    Ok(actor)
}

/// Admin or super admin
#[derive(Debug, Clone)]
pub struct ElevatedOperator(pub AuthenticatedActor);

#[async_trait]
impl<S> FromRequestParts<S> for ElevatedOperator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, Role::Admin).map(ElevatedOperator)
    }
}

/// Super admin only
#[derive(Debug, Clone)]
pub struct SuperAdminOperator(pub AuthenticatedActor);

#[async_trait]
impl<S> FromRequestParts<S> for SuperAdminOperator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, Role::SuperAdmin).map(SuperAdminOperator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_role_ordering() {
        assert!(Role::SuperAdmin > Role::Admin);
        assert!(Role::Admin > Role::Staff);
        assert_eq!("super-admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("janitor".parse::<Role>().is_err());
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(AuthenticatedActor::from_headers(&headers).is_none());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-7"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("admin"));
        headers.insert(USER_NAME_HEADER, HeaderValue::from_static("Ada Admin"));

        let actor = AuthenticatedActor::from_headers(&headers).unwrap();
        assert_eq!(actor.user_id, "u-7");
        assert_eq!(actor.role, Role::Admin);
        assert_eq!(actor.full_name.as_deref(), Some("Ada Admin"));
        assert!(actor.email.is_none());

        let snapshot = actor.snapshot();
        assert_eq!(snapshot.role.as_deref(), Some("admin"));
    }

    #[test]
    fn test_unknown_role_degrades_to_student() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-8"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("root"));

        let actor = AuthenticatedActor::from_headers(&headers).unwrap();
        assert_eq!(actor.role, Role::Student);
    }

    #[test]
    fn test_client_addr_resolution() {
        let peer: IpAddr = "10.0.0.9".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );

        assert_eq!(
            resolve_client_addr(true, &headers, Some(peer)),
            Some("203.0.113.7".parse().unwrap())
        );
        assert_eq!(resolve_client_addr(false, &headers, Some(peer)), Some(peer));
        assert_eq!(resolve_client_addr(false, &headers, None), None);

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(resolve_client_addr(true, &headers, Some(peer)), Some(peer));
    }

    #[test]
    fn test_require_role() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        assert!(matches!(
            require_role(&parts, Role::Admin),
            Err(AppError::Unauthorized(_))
        ));

        parts.extensions.insert(AuthenticatedActor::new("u1", Role::Admin));
        assert!(require_role(&parts, Role::Admin).is_ok());
        assert!(matches!(
            require_role(&parts, Role::SuperAdmin),
            Err(AppError::Forbidden(_))
        ));
    }
}

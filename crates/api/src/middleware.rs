use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use stockroom_core::{TenantId, UserId};

use crate::context::{ActorContext, TenantContext};

/// Headers injected by the upstream gateway once it has authenticated the
/// caller and resolved its tenant.
pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Populate tenant/actor request contexts from gateway headers.
///
/// Requests that reach this service without both headers are rejected;
/// routing and authentication are the gateway's responsibility.
pub async fn context_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let tenant_id: TenantId = parse_header(req.headers(), TENANT_HEADER)?;
    let actor_id: UserId = parse_header(req.headers(), ACTOR_HEADER)?;

    req.extensions_mut().insert(TenantContext::new(tenant_id));
    req.extensions_mut().insert(ActorContext::new(actor_id));

    Ok(next.run(req).await)
}

fn parse_header<T>(headers: &HeaderMap, name: &str) -> Result<T, StatusCode>
where
    T: core::str::FromStr,
{
    let value = headers
        .get(name)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    value.trim().parse().map_err(|_| StatusCode::UNAUTHORIZED)
}

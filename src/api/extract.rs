//! Request extractors.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

/// Network-level identity of the caller, used as the session key.
///
/// The first `x-forwarded-for` entry wins so the orchestrator keys on the
/// real client when running behind a proxy; otherwise the peer address.
#[derive(Debug, Clone)]
pub struct ClientOrigin(pub String);

impl<S> FromRequestParts<S> for ClientOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(forwarded) = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
        {
            if let Some(first) = forwarded
                .split(',')
                .map(str::trim)
                .find(|part| !part.is_empty())
            {
                return Ok(ClientOrigin(first.to_string()));
            }
        }

        let origin = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ClientOrigin(origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn origin_for(request: Request<()>) -> String {
        let (mut parts, ()) = request.into_parts();
        ClientOrigin::from_request_parts(&mut parts, &())
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_forwarded_header_takes_precedence() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(origin_for(request).await, "203.0.113.7");
    }

    #[tokio::test]
    async fn test_peer_address_fallback() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("192.0.2.9:4242".parse().unwrap()));
        assert_eq!(origin_for(request).await, "192.0.2.9");
    }

    #[tokio::test]
    async fn test_unknown_when_nothing_available() {
        let request = Request::builder().body(()).unwrap();
        assert_eq!(origin_for(request).await, "unknown");
    }
}

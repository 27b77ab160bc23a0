//! Client IP extraction.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderName;

/// Client IP of a request.
///
/// With `ip_header` set (when running behind a reverse proxy), the last
/// address in that header is used, since that is the one the proxy appended.
/// Entries to its left come from the client. A missing or malformed header is
/// an error. Otherwise the socket peer address is used.
pub fn extract_client_ip(
    request: &Request,
    ip_header: Option<&HeaderName>,
) -> Result<IpAddr, &'static str> {
    match ip_header {
        Some(name) => {
            let value = request
                .headers()
                .get(name)
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            value
                .rsplit(',')
                .next()
                .map(str::trim)
                .unwrap_or_default()
                .parse()
                .map_err(|_| "IP header does not contain an IP address")
        }
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip())
            .ok_or("No client IP available"),
    }
}

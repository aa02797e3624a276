//! Source-address extraction for throttle keying: `X-Forwarded-For`'s first
//! segment, falling back to the socket peer address, falling back to
//! loopback. Request routing owns which of these is trustworthy in a given
//! deployment; this module only owns the ordering.

use axum::http::HeaderMap;
use std::net::IpAddr;

#[must_use]
pub fn extract(headers: &HeaderMap, peer: Option<IpAddr>) -> IpAddr {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return ip;
            }
        }
    }
    peer.unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(extract(&headers, None), IpAddr::from([203, 0, 113, 5]));
    }

    #[test]
    fn falls_back_to_peer() {
        let headers = HeaderMap::new();
        let peer: IpAddr = "198.51.100.9".parse().unwrap();
        assert_eq!(extract(&headers, Some(peer)), peer);
    }

    #[test]
    fn falls_back_to_loopback() {
        let headers = HeaderMap::new();
        assert_eq!(extract(&headers, None), IpAddr::from([127, 0, 0, 1]));
    }
}

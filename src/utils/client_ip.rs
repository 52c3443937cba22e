// Client IP extraction behind proxies
// First valid address among a fixed, ordered header list wins;
// falls back to the socket peer address.

use axum::http::HeaderMap;
use std::net::IpAddr;

/// Headers checked for the real client address, in priority order.
const PROXY_IP_HEADERS: &[&str] = &[
    "cf-connecting-ip",      // Cloudflare
    "x-forwarded-for",       // Load balancers
    "x-real-ip",             // Nginx
    "x-forwarded",
    "x-cluster-client-ip",
    "forwarded-for",
    "forwarded",
];

/// Extract the client IP from proxy headers, falling back to the peer address.
pub fn extract_client_ip(headers: &HeaderMap, peer: IpAddr) -> String {
    for header in PROXY_IP_HEADERS {
        if let Some(value) = headers.get(*header).and_then(|v| v.to_str().ok()) {
            // Take the first entry when the header carries a list
            let candidate = value.split(',').next().unwrap_or("").trim();
            if candidate.parse::<IpAddr>().is_ok() {
                return candidate.to_string();
            }
        }
    }

    peer.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    #[test]
    fn test_falls_back_to_peer() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers, peer()), "127.0.0.1");
    }

    #[test]
    fn test_forwarded_for_first_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(extract_client_ip(&headers, peer()), "203.0.113.7");
    }

    #[test]
    fn test_header_priority_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.9"));
        // Cloudflare header outranks nginx's
        assert_eq!(extract_client_ip(&headers, peer()), "203.0.113.9");
    }

    #[test]
    fn test_invalid_header_value_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(extract_client_ip(&headers, peer()), "198.51.100.4");
    }

    #[test]
    fn test_ipv6_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("2001:db8::1"));
        assert_eq!(extract_client_ip(&headers, peer()), "2001:db8::1");
    }
}

// Proxy-header client IP extraction

use axum::http::{HeaderMap, HeaderValue};
use std::net::IpAddr;

use rafah_backend::utils::client_ip::extract_client_ip;

fn peer() -> IpAddr {
    "10.1.2.3".parse().unwrap()
}

#[test]
fn test_no_headers_uses_peer_address() {
    assert_eq!(extract_client_ip(&HeaderMap::new(), peer()), "10.1.2.3");
}

#[test]
fn test_cloudflare_header_wins() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1"));
    headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.50"));
    assert_eq!(extract_client_ip(&headers, peer()), "203.0.113.50");
}

#[test]
fn test_forwarded_for_takes_first_hop() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_static("203.0.113.7, 10.0.0.1, 10.0.0.2"),
    );
    assert_eq!(extract_client_ip(&headers, peer()), "203.0.113.7");
}

#[test]
fn test_invalid_candidates_fall_through() {
    let mut headers = HeaderMap::new();
    headers.insert("cf-connecting-ip", HeaderValue::from_static("garbage"));
    headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.8"));
    assert_eq!(extract_client_ip(&headers, peer()), "198.51.100.8");
}

#[test]
fn test_all_invalid_falls_back_to_peer() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static("not, an, ip"));
    assert_eq!(extract_client_ip(&headers, peer()), "10.1.2.3");
}

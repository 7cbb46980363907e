//! Fuzz target for `PeerAddress` parsing.
//!
//! Every accepted address ends up inside a route URI of the rendered server
//! configuration, so parsing must never let through text that breaks out of
//! the `routes = [...]` block.
//!
//! Key properties tested:
//! - Parsing never panics
//! - Accepted addresses have a non-zero port
//! - Accepted addresses contain no whitespace, quotes, brackets or `@`
//!   outside an IPv6 literal
//! - Display output parses back to the same address
//!
//! Run with: `cargo +nightly fuzz run fuzz_peer_address`

#![no_main]

use libfuzzer_sys::fuzz_target;
use natsvisor::endpoints::PeerAddress;

fuzz_target!(|data: &str| {
    let Ok(addr) = data.parse::<PeerAddress>() else {
        return;
    };

    assert_ne!(addr.port(), 0, "port 0 accepted from {data:?}");

    let host = addr.host();
    let inner = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    assert!(!inner.is_empty(), "empty host accepted from {data:?}");
    assert!(
        !inner
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '@' | '[' | ']' | '/' | ',')),
        "unsafe host {host:?} accepted from {data:?}"
    );

    let reparsed: PeerAddress = addr.to_string().parse().expect("display must round-trip");
    assert_eq!(reparsed, addr);
});

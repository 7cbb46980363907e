//! Fuzz target for endpoint payload handling.
//!
//! Discovery records come from other nodes and may be corrupt. The resolver
//! must skip them, never crash on them.
//!
//! Key properties tested:
//! - Arbitrary payload text never panics the parser
//! - A record either yields a valid cluster address or a malformed error
//!
//! Run with: `cargo +nightly fuzz run fuzz_endpoint_payload`

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use natsvisor::discovery::EndpointRecord;
use natsvisor::endpoints::EndpointPayload;

/// Structured input mixing raw text with well-formed JSON shapes.
#[derive(Arbitrary, Debug)]
struct PayloadInput {
    /// Raw payload text
    raw: String,
    /// Role name to place the address under
    role: String,
    /// Address text
    address: String,
    /// Whether to wrap `address` in a JSON payload
    structured: bool,
}

fuzz_target!(|input: PayloadInput| {
    let text = if input.structured {
        let mut payload = EndpointPayload::default();
        payload.endpoints.insert(input.role, input.address);
        serde_json::to_string(&payload).unwrap_or(input.raw)
    } else {
        input.raw
    };

    match EndpointRecord::new(text).cluster_address() {
        Ok(addr) => assert_ne!(addr.port(), 0),
        Err(e) => assert!(matches!(e, natsvisor::Error::MalformedEndpoint { .. })),
    }
});

//! Property-based tests for template rendering.
//!
//! These tests verify invariants of the rendered server configuration:
//! - One route per peer, each carrying the route credentials
//! - The node's own cluster address never appears as a route
//! - No known token survives rendering
//! - Rendering is deterministic
//!
//! Run with:
//! ```bash
//! cargo test --lib render::property_tests
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use percent_encoding::percent_decode_str;
use proptest::prelude::*;

use super::{ClusterCredentials, RenderContext, Template, routes_block};
use crate::endpoints::{NodeEndpoints, PeerAddress};

// ============================================================================
// Test Strategies - Input Generation
// ============================================================================

/// Strategy for hostnames that are valid peer hosts.
fn host() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}

/// Strategy for peer addresses.
fn peer() -> impl Strategy<Value = PeerAddress> {
    (host(), 1u16..=u16::MAX).prop_map(|(h, p)| PeerAddress::new(h, p).unwrap())
}

/// Strategy for non-empty peer sets.
fn peer_set() -> impl Strategy<Value = BTreeSet<PeerAddress>> {
    prop::collection::btree_set(peer(), 1..12)
}

/// Strategy for credential values without line breaks.
fn secret() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_!#%+=-]{1,24}"
}

/// Strategy for route credentials, including URI delimiters.
fn route_secret() -> impl Strategy<Value = String> {
    "[A-Za-z0-9:/#?@%!+= ._~-]{1,24}"
}

fn decode(part: &str) -> String {
    percent_decode_str(part).decode_utf8().unwrap().into_owned()
}

const TEMPLATE: &str = "\
listen: NATS_SERVER_HOST:NATS_SERVER_PORT
http: NATS_HTTP_MONITOR_PORT
log_file: \"NATS_LOG_FILE\"
authorization { user: NATS_SERVER_AUTH_USER, password: NATS_SERVER_AUTH_PASSWORD }
cluster {
  listen: NATS_SERVER_HOST:NATS_CLUSTER_PORT
  authorization { user: NATS_CLUSTER_ROUTE_USER, password: NATS_CLUSTER_ROUTE_PASSWORD }
  NATS_CLUSTER_ROUTES
}
";

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn routes_have_one_entry_per_foreign_peer(
        peers in peer_set(),
        own in peer(),
        include_self in any::<bool>(),
        route_user in route_secret(),
        route_password in route_secret(),
    ) {
        let mut peers = peers;
        if include_self {
            peers.insert(own.clone());
        }
        let endpoints = NodeEndpoints::new(own.host(), 4222, own.port(), 8222);
        let credentials = ClusterCredentials::new("u", "p", route_user.clone(), route_password.clone());
        let ctx = RenderContext {
            endpoints: &endpoints,
            credentials: &credentials,
            peers: &peers,
            log_path: Path::new("/tmp/1.nats.log"),
            route_scheme: "nats-route",
        };

        let block = routes_block(&ctx);
        let foreign: Vec<_> = peers.iter().filter(|p| **p != own).collect();

        if foreign.is_empty() {
            prop_assert!(block.is_empty());
        } else {
            let lines: Vec<&str> = block.lines().collect();
            prop_assert_eq!(lines.first().copied(), Some("routes = ["));
            prop_assert_eq!(lines.last().copied(), Some("]"));

            let routes = &lines[1..lines.len() - 1];
            prop_assert_eq!(routes.len(), foreign.len());

            let mut targets = BTreeSet::new();
            for route in routes {
                let rest = route.strip_prefix("nats-route://").unwrap();
                // The authority ends at the first delimiter, so the userinfo
                // must hold none of them.
                let (userinfo, target) = rest.split_once('@').unwrap();
                prop_assert!(!userinfo.contains(['/', '#', '?']));
                let (user, password) = userinfo.split_once(':').unwrap();
                prop_assert_eq!(decode(user), route_user.clone());
                prop_assert_eq!(decode(password), route_password.clone());
                targets.insert(target.to_string());
            }

            let expected: BTreeSet<String> = foreign.iter().map(ToString::to_string).collect();
            prop_assert_eq!(targets, expected);
            let own_suffix = format!("@{}", own);
            prop_assert!(!routes.iter().any(|r| r.ends_with(&own_suffix)));
        }
    }

    #[test]
    fn rendering_leaves_no_tokens_and_is_deterministic(
        peers in prop::collection::btree_set(peer(), 0..6),
        host in host(),
        user in secret(),
        password in secret(),
    ) {
        let endpoints = NodeEndpoints::new(host, 4222, 6222, 8222);
        let credentials = ClusterCredentials::new(user.clone(), password, user, "route-pw");
        let ctx = RenderContext {
            endpoints: &endpoints,
            credentials: &credentials,
            peers: &peers,
            log_path: Path::new("/tmp/1.nats.log"),
            route_scheme: "nats-route",
        };
        let template = Template::from_text(TEMPLATE);

        let first = template.render(&ctx);
        let second = template.render(&ctx);

        prop_assert!(Template::residual_tokens(&first).is_empty());
        prop_assert_eq!(first, second);
    }
}

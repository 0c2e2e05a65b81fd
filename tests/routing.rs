//! Integration tests for the routing pipeline
//!
//! Exercises the full resolve path a request takes: hostname to subdomain
//! label, label to container candidate, candidate to backend address. Also
//! covers the port auto-detection policy the orchestrator applies at deploy
//! time, since the two together decide where traffic lands.

use lightship::orchestrator::{
    select_routable_port, ContainerSnapshot, ContainerState, PortSpec, DEFAULT_PORT,
};
use lightship::resolver::{resolve, subdomain, Resolution};
use std::collections::HashMap;

// ============================================================================
// Test Helpers
// ============================================================================

fn snapshot(name: &str, state: ContainerState, address: Option<&str>) -> ContainerSnapshot {
    ContainerSnapshot {
        id: format!("{}-0123456789ab", name),
        name: name.to_string(),
        image: format!("{}:latest", name),
        status: match state {
            ContainerState::Running => "Up 10 minutes".to_string(),
            _ => "Exited (0) 2 minutes ago".to_string(),
        },
        state,
        backend_address: address.map(String::from),
        created: 1_700_000_000,
    }
}

fn exposed(keys: &[&str]) -> HashMap<String, HashMap<(), ()>> {
    keys.iter()
        .map(|k| (k.to_string(), HashMap::new()))
        .collect()
}

// ============================================================================
// Hostname Routing
// ============================================================================

#[test]
fn subdomain_request_routes_to_running_container() {
    let snapshots = vec![
        snapshot("blog", ContainerState::Running, Some("127.0.0.1:32768")),
        snapshot("shop", ContainerState::Running, Some("127.0.0.1:32769")),
    ];

    assert_eq!(
        resolve("blog.example.test", &snapshots),
        Resolution::Proxy("127.0.0.1:32768".to_string())
    );
    assert_eq!(
        resolve("shop.example.test", &snapshots),
        Resolution::Proxy("127.0.0.1:32769".to_string())
    );
}

#[test]
fn root_domain_and_www_bypass_the_proxy() {
    let snapshots = vec![snapshot(
        "www",
        ContainerState::Running,
        Some("127.0.0.1:32768"),
    )];

    assert_eq!(resolve("localhost", &snapshots), Resolution::Bypass);
    assert_eq!(resolve("www.example.test", &snapshots), Resolution::Bypass);
}

#[test]
fn single_label_hostname_never_yields_a_subdomain() {
    assert_eq!(subdomain("localhost"), None);
    assert_eq!(subdomain("intranet"), None);
    assert_eq!(subdomain("app.localhost"), Some("app"));
}

#[test]
fn unknown_subdomain_reports_the_app_name() {
    let snapshots = vec![snapshot(
        "blog",
        ContainerState::Running,
        Some("127.0.0.1:32768"),
    )];

    match resolve("missing.example.test", &snapshots) {
        Resolution::NotFound(app) => assert_eq!(app, "missing"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn stopped_container_is_not_routable() {
    // The container exists but only a running one with an address qualifies
    let snapshots = vec![
        snapshot("blog", ContainerState::Exited, None),
        snapshot("blog-api", ContainerState::Running, Some("127.0.0.1:32770")),
    ];

    assert_eq!(
        resolve("blog.example.test", &snapshots),
        Resolution::NotFound("blog".to_string())
    );
    assert_eq!(
        resolve("blog-api.example.test", &snapshots),
        Resolution::Proxy("127.0.0.1:32770".to_string())
    );
}

#[test]
fn restart_replaces_the_routing_target() {
    // The same name re-deployed under a new ephemeral port must win over a
    // lingering older entry regardless of engine listing order.
    let mut old = snapshot("blog", ContainerState::Running, Some("127.0.0.1:32768"));
    old.created = 1_700_000_000;
    let mut new = snapshot("blog", ContainerState::Running, Some("127.0.0.1:32771"));
    new.created = 1_700_000_600;

    for order in [vec![old.clone(), new.clone()], vec![new, old]] {
        assert_eq!(
            resolve("blog.example.test", &order),
            Resolution::Proxy("127.0.0.1:32771".to_string())
        );
    }
}

// ============================================================================
// Port Auto-Detection
// ============================================================================

#[test]
fn preferred_ports_win_in_order() {
    let all = exposed(&["3000/tcp", "8080/tcp", "80/tcp"]);
    assert_eq!(select_routable_port(Some(&all)).key(), "80/tcp");

    let no_http = exposed(&["3000/tcp", "8080/tcp"]);
    assert_eq!(select_routable_port(Some(&no_http)).key(), "8080/tcp");

    let node_only = exposed(&["3000/tcp", "5432/tcp"]);
    assert_eq!(select_routable_port(Some(&node_only)).key(), "3000/tcp");
}

#[test]
fn unlisted_ports_fall_back_to_lowest() {
    let ports = exposed(&["9090/tcp", "6379/tcp"]);
    assert_eq!(select_routable_port(Some(&ports)).key(), "6379/tcp");
}

#[test]
fn no_declared_ports_assumes_the_default() {
    let spec = select_routable_port(None);
    assert_eq!(spec.container_port, DEFAULT_PORT);
    assert_eq!(spec.protocol, "tcp");

    // Host port 0 requests an engine-assigned ephemeral port
    assert_eq!(spec.host_port, 0);
}

#[test]
fn selected_port_round_trips_through_the_engine_key() {
    let spec = select_routable_port(Some(&exposed(&["8080/tcp"])));
    assert_eq!(PortSpec::parse_key(&spec.key()), Some(spec));
}

//! Next-hop selection.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use drats_store::Message;

use crate::access::EmailAccess;
use crate::routes::RouteTable;
use crate::state::RoutingState;

/// Address prefix of Winlink destinations.
pub const WL2K_PREFIX: &str = "WL2K:";

/// Path tag recorded when a message arrived through the email gateway.
pub const EMAIL_PATH_TAG: &str = "EMAIL";

/// A station recently heard on a radio port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeardStation {
    pub call: String,
    pub port: String,
    pub heard: DateTime<Utc>,
}

impl HeardStation {
    pub fn new(call: impl Into<String>, port: impl Into<String>, heard: DateTime<Utc>) -> Self {
        Self {
            call: call.into(),
            port: port.into(),
            heard,
        }
    }
}

/// Heard stations keyed by callsign.
pub type StationList = HashMap<String, HeardStation>;

pub fn is_wl2k(dst: &str) -> bool {
    dst.to_ascii_uppercase().starts_with(WL2K_PREFIX)
}

/// Next node of a gratuitous route `A;B;C` given the path so far.
///
/// `path[0]` is the originator; the rest must follow the route exactly.
/// Returns `None` when the route is exhausted or the path strayed from it.
pub fn gratuitous_next_hop(route: &str, path: &[String]) -> Option<String> {
    let path_nodes = path.get(1..).unwrap_or(&[]);
    let route_nodes: Vec<&str> = route.split(';').collect();

    if path_nodes.len() >= route_nodes.len() {
        log::debug!("Nothing left in the route {}", route);
        return None;
    }

    for (i, (p, r)) in path_nodes.iter().zip(&route_nodes).enumerate() {
        if p != r {
            log::debug!("Path element {} ({}) does not match route {}", i, p, r);
            return None;
        }
    }

    Some(route_nodes[path_nodes.len()].to_string())
}

/// Whether `dst` names somewhere a message could be sent from here.
pub fn is_sendable_dest(mycall: &str, dst: &str) -> bool {
    if dst == mycall {
        log::debug!("{}: message for me", dst);
        return false;
    }
    if dst.trim().is_empty() {
        return false;
    }
    if dst.contains('@') {
        return true;
    }
    if dst != dst.to_uppercase() {
        log::debug!("{}: lowercase", dst);
        return false;
    }
    if dst.split_whitespace().next() != Some(dst) {
        log::debug!("{}: spaces", dst);
        return false;
    }
    if dst.contains(';') && dst.rsplit(';').next() == Some(mycall) {
        log::debug!("{}: end of gratuitous route", dst);
        return false;
    }
    true
}

/// Receive-side decision about a message that just arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardDecision {
    pub forward: bool,
    /// Where it would go next.
    pub next_hop: String,
}

/// Should a received message be queued again for forwarding?
pub fn should_forward(mycall: &str, msg: &Message, forwarding_enabled: bool) -> ForwardDecision {
    let sendable = is_sendable_dest(mycall, &msg.dst);
    let next_hop = gratuitous_next_hop(&msg.dst, &msg.path).unwrap_or_else(|| msg.dst.clone());
    let bounce = msg.src.contains('@') && msg.dst.contains('@');
    let seen = msg
        .path
        .split_last()
        .is_some_and(|(_, earlier)| earlier.iter().any(|c| c == mycall));

    log::info!(
        "Forward decision: fwd:{} sendable:{} next:{} bounce:{} seen:{}",
        forwarding_enabled,
        sendable,
        next_hop,
        bounce,
        seen
    );

    ForwardDecision {
        forward: forwarding_enabled && sendable && !bounce && !seen,
        next_hop,
    }
}

/// Outcome of choosing a route for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Send toward this station, email address or `WL2K:` address.
    Route(String),
    /// The chosen station is stale. Probe it and try again next pass.
    Ping { call: String, port: Option<String> },
    /// Nothing viable.
    NoRoute,
}

/// Everything route selection looks at besides the routing state.
pub struct RouteContext<'a> {
    pub stations: &'a StationList,
    pub routes: &'a RouteTable,
    pub access: &'a EmailAccess,
    pub ttl: Duration,
    pub now: DateTime<Utc>,
}

impl RouteContext<'_> {
    /// Not heard at all, or not within the TTL.
    fn old(&self, call: &str) -> bool {
        match self.stations.get(call) {
            None => true,
            Some(station) => (self.now - station.heard)
                .to_std()
                .is_ok_and(|age| age > self.ttl),
        }
    }
}

/// Pick the next hop for a message from `src` to `dst` that has already
/// visited `path`.
///
/// Candidates in priority order: gratuitous route, email, directly heard
/// station, static route, default route, WL2K. A candidate already on the
/// path, failed, or stale and pinged out is discarded and the next one is
/// tried. A surviving candidate that is merely stale is pinged instead of
/// used.
pub fn choose_route(
    ctx: &RouteContext<'_>,
    state: &mut RoutingState,
    src: &str,
    dst: &str,
    path: &[String],
) -> RouteDecision {
    let mut invalid: Vec<String> = Vec::new();
    let usable = |c: &str, invalid: &[String]| !invalid.iter().any(|i| i == c);

    let route = loop {
        let candidate = if dst.contains(';') {
            let next = gratuitous_next_hop(dst, path);
            log::info!("Route for {}: {:?} ({:?})", dst, next, path);
            break next;
        } else if dst.contains('@')
            && usable(dst, &invalid)
            && !dst.contains(':')
            && ctx.access.validate_outgoing(src, dst)
        {
            dst.to_string()
        } else if ctx.stations.contains_key(dst) && usable(dst, &invalid) {
            dst.to_string()
        } else if let Some(gw) = ctx.routes.get(dst).filter(|gw| usable(gw, &invalid)) {
            gw.to_string()
        } else if let Some(gw) = ctx.routes.default_route().filter(|gw| usable(gw, &invalid)) {
            gw.to_string()
        } else if is_wl2k(dst) {
            dst.to_string()
        } else {
            break None;
        };

        if is_wl2k(&candidate) {
            break Some(candidate);
        } else if candidate != dst && path.contains(&candidate) {
            log::info!("Route {} in path", candidate);
            invalid.push(candidate);
        } else if state.is_station_failed(&candidate) {
            log::info!("Route {} is failed", candidate);
            invalid.push(candidate);
        } else if ctx.old(&candidate) && state.is_pinged_out(&candidate) {
            log::info!("Route {} for {} is pinged out", candidate, dst);
            invalid.push(candidate);
        } else {
            break Some(candidate);
        }
    };

    let Some(route) = route else {
        log::info!("No route for station {}", dst);
        return RouteDecision::NoRoute;
    };

    if ctx.old(&route) && !route.contains('@') && !route.contains(':') {
        state.pinged_incr(&route);
        let port = ctx.stations.get(&route).map(|s| s.port.clone());
        if port.is_some() {
            log::info!("Pinging stale route {}", route);
        }
        RouteDecision::Ping { call: route, port }
    } else {
        state.pinged_clear(&route);
        log::info!("Routing message for {} to {}", dst, route);
        RouteDecision::Route(route)
    }
}

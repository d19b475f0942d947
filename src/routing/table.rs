//! The route table: the gateway's entire external surface as data.
//!
//! # Responsibilities
//! - Hold every declarative route entry
//! - Look up the entry for a method + path
//! - Extract raw path parameters for the forwarder
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan; the table is small and fixed
//! - Most-specific match wins: literal segments outrank placeholders,
//!   placeholders outrank tails

use axum::http::Method;

use crate::routing::payloads::BodySchema;
use crate::routing::route::{Access, RouteEntry};

const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /\n";

/// Immutable collection of route entries.
#[derive(Debug)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

/// A matched entry plus its raw (undecoded) path parameters.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub entry: &'a RouteEntry,
    pub params: Vec<(&'static str, String)>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    /// Find the most specific entry for a request.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.entries
            .iter()
            .filter(|e| e.method == *method)
            .filter_map(|e| {
                e.pattern.matches(path).map(|params| RouteMatch {
                    entry: e,
                    params,
                })
            })
            .max_by_key(|m| {
                (
                    m.entry.pattern.literal_count(),
                    !m.entry.pattern.has_tail(),
                )
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// The full management surface.
    pub fn standard() -> Self {
        use Method as M;

        fn auth(method: Method, pattern: &'static str) -> RouteEntry {
            RouteEntry::new(method, pattern, Access::Authenticated)
        }
        fn open(method: Method, pattern: &'static str) -> RouteEntry {
            RouteEntry::new(method, pattern, Access::Open)
        }

        let entries = vec![
            // Admins
            auth(M::GET, "/admin"),
            auth(M::GET, "/admin/:admin_id"),
            auth(M::PUT, "/admin/:admin_id").body(BodySchema::AdminUpdate),
            auth(M::POST, "/admin").body(BodySchema::AdminCreate),
            auth(M::DELETE, "/admin/:admin_id"),
            auth(M::GET, "/admin/:admin_id/audit"),
            // Sessions
            open(M::POST, "/auth/session").body(BodySchema::AuthSessionCreate),
            open(M::DELETE, "/auth/session"),
            auth(M::GET, "/state"),
            // Events
            auth(M::GET, "/event"),
            auth(M::GET, "/event/:cursor"),
            // Devices
            auth(M::GET, "/device/unregistered"),
            auth(M::PUT, "/device/register/:org_id/:user_id/:device_id")
                .body(BodySchema::DeviceRegister)
                .param_limit(64),
            auth(M::DELETE, "/device/register/:org_id/:user_id/:device_id").param_limit(64),
            // Hosts
            auth(M::GET, "/host").query(&["page"]),
            auth(M::GET, "/host/:host_id"),
            auth(M::PUT, "/host/:host_id").body(BodySchema::HostUpdate),
            auth(M::DELETE, "/host/:host_id"),
            auth(M::GET, "/host/:host_id/usage/:period"),
            // Key data
            auth(M::GET, "/data/:org_id/:user_id"),
            auth(M::GET, "/data/:org_id/:user_id/:server_id"),
            // Keys and single sign-on (backend enforces its own auth)
            open(M::GET, "/key/:param1"),
            open(M::GET, "/key/:param1/:param2"),
            open(M::GET, "/key/:param1/:param2/:param3"),
            open(M::GET, "/key/:param1/:param2/:param3/:param4"),
            open(M::GET, "/key/:param1/:param2/:param3/:param4/:param5"),
            // OAuth-style flows need the query string untouched.
            open(M::GET, "/key/request/*rest").raw_query(),
            open(M::GET, "/key/callback/*rest").raw_query(),
            open(M::POST, "/key/duo").body(BodySchema::DuoChallenge),
            open(M::POST, "/key/yubico").body(BodySchema::YubicoChallenge),
            open(M::PUT, "/key_pin/:key_id").body(BodySchema::KeyPin),
            open(M::GET, "/k/:short_code"),
            open(M::DELETE, "/k/:short_code"),
            open(M::GET, "/ku/:short_code"),
            open(M::POST, "/key/wg/:org_id/:user_id/:server_id").body(BodySchema::KeyExchange),
            open(M::PUT, "/key/wg/:org_id/:user_id/:server_id").body(BodySchema::KeyExchange),
            open(M::POST, "/key/ovpn/:org_id/:user_id/:server_id").body(BodySchema::KeyExchange),
            open(M::POST, "/key/ovpn_wait/:org_id/:user_id/:server_id")
                .body(BodySchema::KeyExchange),
            open(M::POST, "/key/wg_wait/:org_id/:user_id/:server_id")
                .body(BodySchema::KeyExchange),
            open(M::POST, "/sso/authenticate").body(BodySchema::SsoAuthenticate),
            open(M::GET, "/sso/request"),
            open(M::GET, "/sso/callback").raw_query(),
            open(M::POST, "/sso/duo").body(BodySchema::DuoChallenge),
            open(M::POST, "/sso/yubico").body(BodySchema::YubicoChallenge),
            // Links
            auth(M::GET, "/link").query(&["page"]),
            auth(M::POST, "/link").body(BodySchema::LinkCreate),
            // Link agents report state over their own signed channel.
            open(M::PUT, "/link/state").body(BodySchema::LinkState),
            open(M::PUT, "/link/:link_id").body(BodySchema::LinkUpdate),
            open(M::DELETE, "/link/:link_id"),
            auth(M::GET, "/link/:link_id/location"),
            auth(M::POST, "/link/:link_id/location").body(BodySchema::LinkLocationCreate),
            auth(M::PUT, "/link/:link_id/location/:location_id")
                .body(BodySchema::LinkLocationUpdate),
            auth(M::DELETE, "/link/:link_id/location/:location_id"),
            auth(M::POST, "/link/:link_id/location/:location_id/route")
                .body(BodySchema::LinkLocationRoute),
            auth(M::PUT, "/link/:link_id/location/:location_id/route/:route_id")
                .body(BodySchema::LinkLocationRoute),
            auth(M::DELETE, "/link/:link_id/location/:location_id/route/:route_id"),
            auth(M::GET, "/link/:link_id/location/:location_id/host/:host_id/uri"),
            auth(M::GET, "/link/:link_id/location/:location_id/host/:host_id/conf"),
            auth(M::POST, "/link/:link_id/location/:location_id/host")
                .body(BodySchema::LinkLocationHost),
            auth(M::PUT, "/link/:link_id/location/:location_id/host/:host_id")
                .body(BodySchema::LinkLocationHost),
            auth(M::DELETE, "/link/:link_id/location/:location_id/host/:host_id"),
            auth(M::POST, "/link/:link_id/location/:location_id/peer")
                .body(BodySchema::LinkLocationPeer),
            auth(M::DELETE, "/link/:link_id/location/:location_id/peer/:peer_id"),
            auth(M::POST, "/link/:link_id/location/:location_id/transit")
                .body(BodySchema::LinkLocationTransit),
            auth(M::DELETE, "/link/:link_id/location/:location_id/transit/:transit_id"),
            // Logs
            auth(M::GET, "/log"),
            auth(M::GET, "/logs"),
            // Organizations
            auth(M::GET, "/organization").query(&["page"]),
            auth(M::GET, "/organization/:org_id"),
            auth(M::POST, "/organization").body(BodySchema::OrgCreate),
            auth(M::PUT, "/organization/:org_id").body(BodySchema::OrgUpdate),
            auth(M::DELETE, "/organization/:org_id"),
            // Health
            open(M::GET, "/ping"),
            open(M::GET, "/check"),
            // Crawlers get nothing.
            RouteEntry::fixed(M::GET, "/robots.txt", ROBOTS_TXT, "text/plain"),
            // Servers
            auth(M::GET, "/server").query(&["page"]),
            auth(M::GET, "/server/:server_id"),
            auth(M::POST, "/server").body(BodySchema::ServerSettings),
            auth(M::PUT, "/server/:server_id").body(BodySchema::ServerSettings),
            auth(M::DELETE, "/server/:server_id"),
            auth(M::GET, "/server/:server_id/organization"),
            auth(M::PUT, "/server/:server_id/organization/:org_id"),
            auth(M::DELETE, "/server/:server_id/organization/:org_id"),
            auth(M::GET, "/server/:server_id/route"),
            auth(M::POST, "/server/:server_id/route").body(BodySchema::ServerRoute),
            auth(M::POST, "/server/:server_id/routes").body(BodySchema::ServerRoutes),
            auth(M::PUT, "/server/:server_id/route/:route_net").body(BodySchema::ServerRoute),
            auth(M::DELETE, "/server/:server_id/route/:route_net"),
            auth(M::GET, "/server/:server_id/host"),
            auth(M::PUT, "/server/:server_id/host/:host_id"),
            auth(M::DELETE, "/server/:server_id/host/:host_id"),
            auth(M::GET, "/server/:server_id/link"),
            auth(M::PUT, "/server/:server_id/link/:link_id").body(BodySchema::ServerLinkUpdate),
            auth(M::DELETE, "/server/:server_id/link/:link_id"),
            auth(M::PUT, "/server/:server_id/operation/:operation"),
            auth(M::GET, "/server/:server_id/output"),
            auth(M::DELETE, "/server/:server_id/output"),
            auth(M::GET, "/server/:server_id/link_output"),
            auth(M::DELETE, "/server/:server_id/link_output"),
            auth(M::GET, "/server/:server_id/bandwidth/:period"),
            // Settings
            auth(M::GET, "/settings"),
            auth(M::PUT, "/settings").body(BodySchema::SettingsUpdate),
            auth(M::GET, "/settings/zones"),
            // Setup and upgrade pages (pre-auth by nature)
            open(M::GET, "/setup"),
            open(M::GET, "/upgrade"),
            open(M::GET, "/setup/s/fredoka-one.eot"),
            open(M::GET, "/setup/s/ubuntu-bold.eot"),
            open(M::GET, "/setup/s/fredoka-one.woff"),
            open(M::GET, "/setup/s/ubuntu-bold.woff"),
            open(M::PUT, "/setup/mongodb").body(BodySchema::SetupMongo),
            open(M::GET, "/setup/upgrade"),
            open(M::GET, "/success"),
            // Static assets
            auth(M::GET, "/s/*path"),
            open(M::GET, "/fredoka-one.eot"),
            open(M::GET, "/ubuntu-bold.eot"),
            open(M::GET, "/fredoka-one.woff"),
            open(M::GET, "/ubuntu-bold.woff"),
            open(M::GET, "/logo.png"),
            auth(M::GET, "/"),
            open(M::GET, "/login"),
            // Status
            auth(M::GET, "/status"),
            // Subscription
            auth(M::GET, "/subscription"),
            auth(M::GET, "/subscription/styles/:plan/:ver"),
            auth(M::POST, "/subscription").body(BodySchema::SubscriptionActivate),
            auth(M::PUT, "/subscription").body(BodySchema::SubscriptionUpdate),
            auth(M::DELETE, "/subscription"),
            // Users
            auth(M::GET, "/user/:org_id").query(&["page", "search", "limit"]),
            auth(M::GET, "/user/:org_id/:user_id"),
            auth(M::POST, "/user/:org_id").body(BodySchema::UserCreate),
            auth(M::POST, "/user/:org_id/multi").body(BodySchema::UserMulti),
            auth(M::PUT, "/user/:org_id/:user_id").body(BodySchema::UserUpdate),
            auth(M::DELETE, "/user/:org_id/:user_id"),
            auth(M::PUT, "/user/:org_id/:user_id/otp_secret"),
            auth(M::GET, "/user/:org_id/:user_id/audit"),
            auth(M::PUT, "/user/:org_id/:user_id/device/:device_id"),
            auth(M::DELETE, "/user/:org_id/:user_id/device/:device_id"),
        ];

        Self::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route::{QueryPolicy, RouteAction};

    #[test]
    fn test_exact_lookup() {
        let table = RouteTable::standard();
        let m = table.lookup(&Method::GET, "/host").unwrap();
        assert_eq!(m.entry.pattern.source, "/host");
        assert!(m.params.is_empty());
    }

    #[test]
    fn test_param_lookup() {
        let table = RouteTable::standard();
        let m = table.lookup(&Method::PUT, "/host/abc123").unwrap();
        assert_eq!(m.entry.pattern.source, "/host/:host_id");
        assert_eq!(m.params, vec![("host_id", "abc123".to_string())]);
        assert_eq!(m.entry.body, Some(BodySchema::HostUpdate));
    }

    #[test]
    fn test_unmatched_method() {
        let table = RouteTable::standard();
        assert!(table.lookup(&Method::PATCH, "/host/abc123").is_none());
    }

    #[test]
    fn test_unmatched_path() {
        let table = RouteTable::standard();
        assert!(table.lookup(&Method::GET, "/definitely/not/here").is_none());
    }

    #[test]
    fn test_literal_beats_param() {
        let table = RouteTable::standard();
        let m = table.lookup(&Method::PUT, "/link/state").unwrap();
        assert_eq!(m.entry.body, Some(BodySchema::LinkState));

        let m = table.lookup(&Method::PUT, "/link/5f2a").unwrap();
        assert_eq!(m.entry.body, Some(BodySchema::LinkUpdate));
    }

    #[test]
    fn test_raw_query_routes() {
        let table = RouteTable::standard();
        let m = table.lookup(&Method::GET, "/sso/callback").unwrap();
        assert_eq!(m.entry.query, QueryPolicy::Raw);

        let m = table.lookup(&Method::GET, "/key/callback/org/token").unwrap();
        assert_eq!(m.entry.query, QueryPolicy::Raw);

        // Ordinary key fetches re-encode nothing.
        let m = table.lookup(&Method::GET, "/key/abc/def").unwrap();
        assert_eq!(m.entry.query, QueryPolicy::None);
        assert_eq!(m.entry.pattern.source, "/key/:param1/:param2");
    }

    #[test]
    fn test_wildcard_static_path() {
        let table = RouteTable::standard();
        let m = table.lookup(&Method::GET, "/s/app/main.css").unwrap();
        assert_eq!(m.entry.pattern.source, "/s/*path");
        assert_eq!(m.params, vec![("path", "app/main.css".to_string())]);
    }

    #[test]
    fn test_robots_is_fixed() {
        let table = RouteTable::standard();
        let m = table.lookup(&Method::GET, "/robots.txt").unwrap();
        assert!(matches!(m.entry.action, RouteAction::Fixed { .. }));
    }

    #[test]
    fn test_no_duplicate_shapes() {
        // Two entries with the same method and pattern would make lookup
        // order-dependent; catch it at test time.
        let table = RouteTable::standard();
        let mut seen = std::collections::HashSet::new();
        for entry in table.entries() {
            let key = (entry.method.clone(), entry.pattern.source);
            assert!(seen.insert(key), "duplicate route {:?}", entry.pattern.source);
        }
    }

    #[test]
    fn test_root_requires_auth() {
        let table = RouteTable::standard();
        let m = table.lookup(&Method::GET, "/").unwrap();
        assert_eq!(m.entry.access, Access::Authenticated);
    }
}

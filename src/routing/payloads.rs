//! Declared JSON body shapes for forwarded routes.
//!
//! The gateway validates structure only: a request body is deserialized
//! into the declared shape, then re-serialized canonically before
//! forwarding. Undeclared fields are dropped on the floor, missing
//! fields take their zero values. Field semantics belong to the backend.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of a declared body shape, carried by route entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySchema {
    AdminCreate,
    AdminUpdate,
    AuthSessionCreate,
    DeviceRegister,
    HostUpdate,
    DuoChallenge,
    YubicoChallenge,
    KeyPin,
    KeyExchange,
    SsoAuthenticate,
    LinkCreate,
    LinkUpdate,
    LinkState,
    LinkLocationCreate,
    LinkLocationUpdate,
    LinkLocationRoute,
    LinkLocationHost,
    LinkLocationPeer,
    LinkLocationTransit,
    OrgCreate,
    OrgUpdate,
    ServerSettings,
    ServerRoute,
    ServerRoutes,
    ServerLinkUpdate,
    SettingsUpdate,
    SetupMongo,
    SubscriptionActivate,
    SubscriptionUpdate,
    UserCreate,
    UserMulti,
    UserUpdate,
}

impl BodySchema {
    /// Deserialize `bytes` into this shape and re-serialize canonically.
    pub fn canonicalize(&self, bytes: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            BodySchema::AdminCreate => rebuild::<AdminCreate>(bytes),
            BodySchema::AdminUpdate => rebuild::<AdminUpdate>(bytes),
            BodySchema::AuthSessionCreate => rebuild::<AuthSessionCreate>(bytes),
            BodySchema::DeviceRegister => rebuild::<DeviceRegister>(bytes),
            BodySchema::HostUpdate => rebuild::<HostUpdate>(bytes),
            BodySchema::DuoChallenge => rebuild::<DuoChallenge>(bytes),
            BodySchema::YubicoChallenge => rebuild::<YubicoChallenge>(bytes),
            BodySchema::KeyPin => rebuild::<KeyPin>(bytes),
            BodySchema::KeyExchange => rebuild::<KeyExchange>(bytes),
            BodySchema::SsoAuthenticate => rebuild::<SsoAuthenticate>(bytes),
            BodySchema::LinkCreate => rebuild::<LinkCreate>(bytes),
            BodySchema::LinkUpdate => rebuild::<LinkUpdate>(bytes),
            BodySchema::LinkState => rebuild::<LinkState>(bytes),
            BodySchema::LinkLocationCreate => rebuild::<LinkLocation>(bytes),
            BodySchema::LinkLocationUpdate => rebuild::<LinkLocation>(bytes),
            BodySchema::LinkLocationRoute => rebuild::<LinkLocationRoute>(bytes),
            BodySchema::LinkLocationHost => rebuild::<LinkLocationHost>(bytes),
            BodySchema::LinkLocationPeer => rebuild::<LinkLocationPeer>(bytes),
            BodySchema::LinkLocationTransit => rebuild::<LinkLocationTransit>(bytes),
            BodySchema::OrgCreate => rebuild::<OrgCreate>(bytes),
            BodySchema::OrgUpdate => rebuild::<OrgUpdate>(bytes),
            BodySchema::ServerSettings => rebuild::<ServerSettings>(bytes),
            BodySchema::ServerRoute => rebuild::<ServerRoute>(bytes),
            BodySchema::ServerRoutes => rebuild::<Vec<ServerRoute>>(bytes),
            BodySchema::ServerLinkUpdate => rebuild::<ServerLinkUpdate>(bytes),
            BodySchema::SettingsUpdate => rebuild::<SettingsUpdate>(bytes),
            BodySchema::SetupMongo => rebuild::<SetupMongo>(bytes),
            BodySchema::SubscriptionActivate => rebuild::<SubscriptionActivate>(bytes),
            BodySchema::SubscriptionUpdate => rebuild::<SubscriptionUpdate>(bytes),
            BodySchema::UserCreate => rebuild::<UserCreate>(bytes),
            BodySchema::UserMulti => rebuild::<Vec<UserCreate>>(bytes),
            BodySchema::UserUpdate => rebuild::<UserUpdate>(bytes),
        }
    }
}

fn rebuild<T: DeserializeOwned + Serialize>(bytes: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let value: T = serde_json::from_slice(bytes)?;
    serde_json::to_vec(&value)
}

/// A field that may be absent, a string, or a boolean.
///
/// Anything else in the inbound document is nulled out rather than
/// forwarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PinValue {
    #[default]
    Absent,
    Value(String),
    Flag(bool),
}

impl Serialize for PinValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PinValue::Absent => serializer.serialize_none(),
            PinValue::Value(s) => serializer.serialize_str(s),
            PinValue::Flag(b) => serializer.serialize_bool(*b),
        }
    }
}

impl<'de> Deserialize<'de> for PinValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => PinValue::Value(s),
            serde_json::Value::Bool(b) => PinValue::Flag(b),
            _ => PinValue::Absent,
        })
    }
}

/// A field that may be absent, a string, or an integer.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MssFix {
    #[default]
    Absent,
    Value(String),
    Size(i64),
}

impl Serialize for MssFix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MssFix::Absent => serializer.serialize_none(),
            MssFix::Value(s) => serializer.serialize_str(s),
            MssFix::Size(n) => serializer.serialize_i64(*n),
        }
    }
}

impl<'de> Deserialize<'de> for MssFix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => MssFix::Value(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(v) => MssFix::Size(v),
                None => MssFix::Absent,
            },
            _ => MssFix::Absent,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminCreate {
    pub username: String,
    pub password: String,
    pub yubikey_id: String,
    pub otp_auth: bool,
    pub auth_api: bool,
    pub disabled: bool,
    pub super_user: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminUpdate {
    pub username: String,
    pub password: String,
    pub yubikey_id: String,
    pub super_user: bool,
    pub auth_api: bool,
    pub token: String,
    pub secret: String,
    pub disabled: bool,
    pub otp_auth: bool,
    pub otp_secret: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSessionCreate {
    pub username: String,
    pub password: String,
    pub yubico_key: String,
    pub otp_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceRegister {
    pub device_name: String,
    pub device_reg_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostUpdate {
    pub name: String,
    pub public_address: String,
    pub public_address6: String,
    pub routed_subnet6: String,
    pub routed_subnet6_wg: String,
    pub proxy_ndp: bool,
    pub local_address: String,
    pub local_address6: String,
    pub link_address: String,
    pub sync_address: String,
    pub availability_group: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DuoChallenge {
    pub token: String,
    pub passcode: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct YubicoChallenge {
    pub token: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPin {
    pub pin: String,
    pub current_pin: String,
}

/// Shared shape for the wg/ovpn key exchange endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyExchange {
    pub data: String,
    pub nonce: String,
    pub public_key: String,
    pub signature: String,
    pub device_signature: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SsoAuthenticate {
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub ipv6: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkUpdate {
    pub name: String,
    pub status: String,
    pub key: bool,
    pub ipv6: bool,
}

/// Agent-reported state for `/link/state`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkState {
    pub version: String,
    pub public_address: String,
    pub local_address: String,
    pub address6: String,
    pub provider: String,
    pub status: std::collections::BTreeMap<String, String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkLocation {
    pub name: String,
    pub link_id: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkLocationRoute {
    pub network: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkLocationHost {
    pub name: String,
    pub timeout: i64,
    pub priority: i64,
    #[serde(rename = "static")]
    pub is_static: bool,
    pub public_address: String,
    pub local_address: String,
    pub address6: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkLocationPeer {
    pub peer_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkLocationTransit {
    pub transit_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgCreate {
    pub name: String,
    pub auth_api: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrgUpdate {
    pub name: String,
    pub auth_api: bool,
    pub auth_token: bool,
    pub auth_secret: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub name: String,
    pub network: String,
    pub network_wg: String,
    pub network_mode: String,
    pub network_start: String,
    pub network_end: String,
    pub restrict_routes: bool,
    pub wg: bool,
    pub ipv6: bool,
    pub ipv6_firewall: bool,
    pub dynamic_firewall: bool,
    pub geo_sort: bool,
    pub force_connect: bool,
    pub device_auth: bool,
    pub bind_address: String,
    pub protocol: String,
    pub port: i64,
    pub port_wg: i64,
    pub dh_param_bits: i64,
    pub groups: Vec<String>,
    pub multi_device: bool,
    pub dns_servers: Vec<String>,
    pub search_domain: String,
    pub inter_client: bool,
    pub ping_interval: i64,
    pub ping_timeout: i64,
    pub link_ping_interval: i64,
    pub link_ping_timeout: i64,
    pub inactive_timeout: i64,
    pub session_timeout: i64,
    pub allowed_devices: String,
    pub max_clients: i64,
    pub max_devices: i64,
    pub replica_count: i64,
    pub vxlan: bool,
    pub dns_mapping: bool,
    pub route_dns: bool,
    pub debug: bool,
    pub sso_auth: bool,
    pub otp_auth: bool,
    pub lzo_compression: bool,
    pub cipher: String,
    pub hash: String,
    pub block_outside_dns: bool,
    pub jumbo_frames: bool,
    pub pre_connect_msg: String,
    pub policy: String,
    pub mss_fix: MssFix,
    pub multihome: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerRoute {
    pub network: String,
    pub comment: String,
    pub metric: i64,
    pub nat: bool,
    pub nat_interface: String,
    pub nat_netmap: String,
    pub advertise: bool,
    pub vpc_region: String,
    pub vpc_id: String,
    pub net_gateway: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerLinkUpdate {
    pub use_local_address: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    pub username: String,
    pub password: String,
    pub server_cert: String,
    pub server_key: String,
    pub server_port: i64,
    pub acme_domain: String,
    pub auditing: String,
    pub monitoring: String,
    pub influxdb_uri: String,
    pub email_from: String,
    pub email_server: String,
    pub email_username: String,
    pub email_password: String,
    pub pin_mode: String,
    pub sso: String,
    pub sso_match: Vec<String>,
    pub sso_google_key: String,
    pub sso_google_email: String,
    pub sso_duo_token: String,
    pub sso_duo_secret: String,
    pub sso_duo_host: String,
    pub sso_duo_mode: String,
    pub sso_yubico_client: String,
    pub sso_yubico_secret: String,
    pub sso_radius_secret: String,
    pub sso_radius_host: String,
    pub sso_org: String,
    pub sso_saml_url: String,
    pub sso_saml_issuer_url: String,
    pub sso_saml_cert: String,
    pub sso_okta_app_id: String,
    pub sso_okta_push: bool,
    pub sso_okta_token: String,
    pub sso_onelogin_app_id: String,
    pub sso_onelogin_id: String,
    pub sso_onelogin_secret: String,
    pub sso_onelogin_push: bool,
    pub sso_cache: bool,
    pub sso_client_cache: bool,
    pub client_reconnect: bool,
    pub theme: String,
    pub public_address: String,
    pub public_address6: String,
    pub routed_subnet6: String,
    pub reverse_proxy: bool,
    pub cloud_provider: String,
    pub route53_region: String,
    pub route53_zone: String,
    pub us_east_1_access_key: String,
    pub us_east_1_secret_key: String,
    pub us_east_2_access_key: String,
    pub us_east_2_secret_key: String,
    pub us_west_1_access_key: String,
    pub us_west_1_secret_key: String,
    pub us_west_2_access_key: String,
    pub us_west_2_secret_key: String,
    pub us_gov_west_1_access_key: String,
    pub us_gov_west_1_secret_key: String,
    pub eu_west_1_access_key: String,
    pub eu_west_1_secret_key: String,
    pub eu_west_2_access_key: String,
    pub eu_west_2_secret_key: String,
    pub eu_central_1_access_key: String,
    pub eu_central_1_secret_key: String,
    pub ca_central_1_access_key: String,
    pub ca_central_1_secret_key: String,
    pub ap_northeast_1_access_key: String,
    pub ap_northeast_1_secret_key: String,
    pub ap_northeast_2_access_key: String,
    pub ap_northeast_2_secret_key: String,
    pub ap_southeast_1_access_key: String,
    pub ap_southeast_1_secret_key: String,
    pub ap_southeast_2_access_key: String,
    pub ap_southeast_2_secret_key: String,
    pub ap_south_1_access_key: String,
    pub ap_south_1_secret_key: String,
    pub sa_east_1_access_key: String,
    pub sa_east_1_secret_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupMongo {
    pub setup_key: String,
    pub mongodb_uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionActivate {
    pub license: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionUpdate {
    pub card: String,
    pub email: String,
    pub plan: String,
    pub promo_code: String,
    pub cancel: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPortForwarding {
    pub protocol: String,
    pub port: String,
    pub dport: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserCreate {
    pub name: String,
    pub email: String,
    pub auth_type: String,
    pub groups: Vec<String>,
    pub pin: String,
    pub disabled: bool,
    pub network_links: Vec<String>,
    pub bypass_secondary: bool,
    pub client_to_client: bool,
    pub dns_servers: Vec<String>,
    pub dns_suffix: String,
    pub port_forwarding: Vec<UserPortForwarding>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserUpdate {
    pub name: String,
    pub email: String,
    pub auth_type: String,
    pub groups: Vec<String>,
    pub pin: PinValue,
    pub disabled: bool,
    pub network_links: Vec<String>,
    pub bypass_secondary: bool,
    pub client_to_client: bool,
    pub dns_servers: Vec<String>,
    pub dns_suffix: String,
    pub port_forwarding: Vec<UserPortForwarding>,
    pub send_key_email: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undeclared_fields_dropped() {
        let body = br#"{"name":"x","evil":"1; DROP TABLE hosts"}"#;
        let out = BodySchema::HostUpdate.canonicalize(body).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(r#""name":"x""#));
        assert!(!text.contains("evil"));
    }

    #[test]
    fn test_missing_fields_zeroed() {
        let out = BodySchema::OrgCreate.canonicalize(b"{}").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(r#""name":"""#));
        assert!(text.contains(r#""auth_api":false"#));
    }

    #[test]
    fn test_non_json_rejected() {
        assert!(BodySchema::OrgCreate.canonicalize(b"not json").is_err());
    }

    #[test]
    fn test_pin_value_shapes() {
        let user: UserUpdate = serde_json::from_str(r#"{"pin":"123456"}"#).unwrap();
        assert_eq!(user.pin, PinValue::Value("123456".to_string()));

        let user: UserUpdate = serde_json::from_str(r#"{"pin":false}"#).unwrap();
        assert_eq!(user.pin, PinValue::Flag(false));

        let user: UserUpdate = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(user.pin, PinValue::Absent);

        // Illegal shape nulls out instead of passing through.
        let user: UserUpdate = serde_json::from_str(r#"{"pin":{"a":1}}"#).unwrap();
        assert_eq!(user.pin, PinValue::Absent);
        let text = serde_json::to_string(&user).unwrap();
        assert!(text.contains(r#""pin":null"#));
    }

    #[test]
    fn test_mss_fix_shapes() {
        let s: ServerSettings = serde_json::from_str(r#"{"mss_fix":1400}"#).unwrap();
        assert_eq!(s.mss_fix, MssFix::Size(1400));

        let s: ServerSettings = serde_json::from_str(r#"{"mss_fix":"auto"}"#).unwrap();
        assert_eq!(s.mss_fix, MssFix::Value("auto".to_string()));

        let s: ServerSettings = serde_json::from_str(r#"{"mss_fix":[1]}"#).unwrap();
        assert_eq!(s.mss_fix, MssFix::Absent);
    }

    #[test]
    fn test_user_multi_is_array() {
        let body = br#"[{"name":"a"},{"name":"b"}]"#;
        let out = BodySchema::UserMulti.canonicalize(body).unwrap();
        let users: Vec<UserCreate> = serde_json::from_slice(&out).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[1].name, "b");
    }
}

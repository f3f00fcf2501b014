//! Blacklist plugin configuration.

/// Options consumed by the blacklist checker, with the host's defaults.
#[derive(Debug, Clone)]
pub struct BlacklistConfig {
    /// Signature provider spec, `PUBKEY=SCHEME:PAYLOAD`.
    pub signature_provider: String,

    /// Account hosting the blacklist contract.
    pub contract: String,

    /// Permission used when submitting hashes.
    pub permission: String,

    /// This node's producer name (first `producer-name` entry), if any.
    pub producer_name: Option<String>,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        BlacklistConfig {
            signature_provider: "HEARTBEAT_PUB_KEY=KEY:HEARTBEAT_PRIVATE_KEY".into(),
            contract: "theblacklist".into(),
            permission: "blacklist".into(),
            producer_name: None,
        }
    }
}

//! Plugin lifecycle for the blacklist checker.

use std::sync::Arc;

use tracing::{info, warn};

use scribe_core::controller::ChainReader;

use crate::config::BlacklistConfig;
use crate::error::Result;
use crate::reconciler::{CheckHashResult, Reconciler};
use crate::signature::{KeyPair, parse_signature_provider};

/// The blacklist integrity checker plugin.
pub struct BlacklistPlugin {
    config: BlacklistConfig,
    key: Option<KeyPair>,
    reconciler: Reconciler,
}

impl BlacklistPlugin {
    /// Initialize from options. Signature provider parse failures are
    /// logged and leave the key unset; they never abort startup.
    pub fn new(config: BlacklistConfig, reader: Arc<dyn ChainReader>) -> Self {
        let key = match parse_signature_provider(&config.signature_provider) {
            Ok(key) => key,
            Err(e) => {
                warn!(
                    spec = %config.signature_provider,
                    error = %e,
                    "malformed signature provider, ignoring"
                );
                None
            }
        };
        let reconciler = Reconciler::new(reader, &config);
        BlacklistPlugin {
            config,
            key,
            reconciler,
        }
    }

    pub fn config(&self) -> &BlacklistConfig {
        &self.config
    }

    /// Whether a usable signing key was configured.
    pub fn has_signing_key(&self) -> bool {
        self.key.is_some()
    }

    /// Run one reconciliation against the current chain state.
    pub fn check_hash(&self) -> Result<CheckHashResult> {
        self.reconciler.check_hash()
    }

    /// Startup check, logged rather than fatal.
    pub fn startup(&self) {
        info!("blacklist checking");
        match self.check_hash() {
            Ok(result) => info!(
                local_hash = %result.local_hash,
                msg = %result.msg,
                "blacklist hash checked"
            ),
            Err(e) => warn!(error = %e, "blacklist check failed at startup"),
        }
    }
}

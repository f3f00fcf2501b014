//! Signature provider spec parsing.
//!
//! Specs have the form `PUBKEY=SCHEME:PAYLOAD`. The `KEY` scheme carries a
//! private key inline; `KEOSD` (an external signer daemon) is not
//! supported. Parse failures never abort startup — the caller logs and
//! leaves the key unset.

use tracing::{error, info, warn};

use crate::error::{Error, Result};

/// An inline signing key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
}

/// Parse a signature provider spec.
///
/// Returns `Ok(None)` for schemes that are recognized but unusable
/// (`KEOSD`) and for unrecognized schemes; both are logged. Missing
/// separators are a configuration error.
pub fn parse_signature_provider(spec: &str) -> Result<Option<KeyPair>> {
    let (public_key, rest) = spec
        .split_once('=')
        .ok_or_else(|| Error::Config("missing \"=\" in the key spec pair".into()))?;
    let (scheme, payload) = rest
        .split_once(':')
        .ok_or_else(|| Error::Config("missing \":\" in the key spec pair".into()))?;
    if public_key.is_empty() {
        return Err(Error::Config("empty public key in the key spec pair".into()));
    }
    match scheme {
        "KEY" => {
            info!("blacklist key loaded");
            Ok(Some(KeyPair {
                public_key: public_key.to_owned(),
                private_key: payload.to_owned(),
            }))
        }
        "KEOSD" => {
            error!("KEOSD blacklist key not supported");
            Ok(None)
        }
        other => {
            warn!(scheme = other, "unrecognized signature provider scheme, ignoring");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_scheme_yields_a_key_pair() {
        let pair = parse_signature_provider("PUB_K1_example=KEY:5Kexample")
            .unwrap()
            .unwrap();
        assert_eq!(pair.public_key, "PUB_K1_example");
        assert_eq!(pair.private_key, "5Kexample");
    }

    #[test]
    fn missing_equals_is_a_config_error() {
        let err = parse_signature_provider("PUB_K1_exampleKEY:5K").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("\"=\""));
    }

    #[test]
    fn missing_colon_is_a_config_error() {
        let err = parse_signature_provider("PUB_K1_example=KEY5K").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("\":\""));
    }

    #[test]
    fn keosd_scheme_is_rejected_without_error() {
        let parsed = parse_signature_provider("PUB_K1_example=KEOSD:http://localhost:8900");
        assert!(parsed.unwrap().is_none());
    }

    #[test]
    fn unknown_scheme_is_ignored() {
        let parsed = parse_signature_provider("PUB_K1_example=VAULT:secret/path");
        assert!(parsed.unwrap().is_none());
    }

    #[test]
    fn payload_may_contain_colons() {
        // only the first ":" separates scheme from payload
        let pair = parse_signature_provider("PUB=KEY:a:b:c").unwrap().unwrap();
        assert_eq!(pair.private_key, "a:b:c");
    }
}

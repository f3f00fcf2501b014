//! Canonical blacklist fingerprinting.
//!
//! The canonical serialization of an account set is one `actor-blacklist=`
//! line per name, sorted ascending; the fingerprint is the SHA-256 of those
//! bytes as lowercase hex. Sorting first makes the fingerprint invariant
//! under any permutation of the input.

use sha2::{Digest, Sha256};

/// Canonical byte form: `actor-blacklist=<name>\n` lines in sorted order.
pub fn canonical_serialization(accounts: &[String]) -> String {
    let mut sorted: Vec<&str> = accounts.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut out = String::new();
    for account in sorted {
        out.push_str("actor-blacklist=");
        out.push_str(account);
        out.push('\n');
    }
    out
}

/// Canonical fingerprint: SHA-256 hex of [`canonical_serialization`].
pub fn blacklist_hash(accounts: &[String]) -> String {
    hex::encode(Sha256::digest(canonical_serialization(accounts).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn serialization_is_sorted_lines() {
        let input = owned(&["bob", "alice", "carol"]);
        assert_eq!(
            canonical_serialization(&input),
            "actor-blacklist=alice\nactor-blacklist=bob\nactor-blacklist=carol\n"
        );
    }

    #[test]
    fn known_fingerprint() {
        // SHA-256 of "actor-blacklist=alice\nactor-blacklist=bob\nactor-blacklist=carol\n"
        let input = owned(&["bob", "alice", "carol"]);
        assert_eq!(
            blacklist_hash(&input),
            "169b5cb8d608fa5fa509f332b0b39964b5c05a2cca04825a2a3e34902d4de55d"
        );
    }

    #[test]
    fn invariant_under_permutation() {
        let orders = [
            owned(&["alice", "bob", "carol"]),
            owned(&["carol", "alice", "bob"]),
            owned(&["bob", "carol", "alice"]),
        ];
        let hashes: Vec<String> = orders.iter().map(|o| blacklist_hash(o)).collect();
        assert_eq!(hashes[0], hashes[1]);
        assert_eq!(hashes[1], hashes[2]);
    }

    #[test]
    fn empty_set_hashes_the_empty_string() {
        assert_eq!(canonical_serialization(&[]), "");
        // SHA-256 of the empty byte string
        assert_eq!(
            blacklist_hash(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn differs_when_membership_differs() {
        let two = owned(&["a", "b"]);
        let three = owned(&["a", "b", "c"]);
        assert_ne!(blacklist_hash(&two), blacklist_hash(&three));
    }
}

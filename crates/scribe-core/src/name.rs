//! 64-bit base-32 encoded account names.
//!
//! Account names are at most 13 characters drawn from `.12345a-z`, packed
//! into a `u64`: the first twelve characters take five bits each and the
//! thirteenth takes the remaining four (so it is restricted to `.1-5a-j`).
//! The packed form sorts the same way as the string form, which is what the
//! on-chain tables rely on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// The privileged system account, `eosio`.
pub const SYSTEM_ACCOUNT: Name = Name::from_u64(0x5530_ea00_0000_0000);

/// Name of the system action that installs a contract ABI, `setabi`.
pub const SETABI_ACTION: Name = Name::from_u64(0xc2b2_63b8_0000_0000);

/// Name of the system action that creates an account, `newaccount`.
pub const NEWACCOUNT_ACTION: Name = Name::from_u64(0x9ab8_6422_9a9e_4000);

const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";

/// A 64-bit base-32 account (or action, table, permission) name.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Name(u64);

impl Name {
    /// Wrap an already-encoded value.
    pub const fn from_u64(value: u64) -> Self {
        Name(value)
    }

    /// The raw encoded value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// True for the empty name.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a name from its string form.
    pub fn new(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() > 13 {
            return Err(Error::Name(format!("{s}: longer than 13 characters")));
        }
        let mut value = 0u64;
        for (i, &c) in bytes.iter().enumerate() {
            let sym = char_to_symbol(c)
                .ok_or_else(|| Error::Name(format!("{s}: invalid character {:?}", c as char)))?;
            if i < 12 {
                value |= (sym & 0x1f) << (64 - 5 * (i as u64 + 1));
            } else {
                if sym & 0x0f != sym {
                    return Err(Error::Name(format!(
                        "{s}: thirteenth character must be one of .1-5a-j"
                    )));
                }
                value |= sym;
            }
        }
        Ok(Name(value))
    }
}

fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some(u64::from(c - b'a') + 6),
        b'1'..=b'5' => Some(u64::from(c - b'1') + 1),
        b'.' => Some(0),
        _ => None,
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = [b'.'; 13];
        let mut tmp = self.0;
        for i in 0..13 {
            let mask = if i == 0 { 0x0f } else { 0x1f };
            chars[12 - i] = CHARMAP[(tmp & mask) as usize];
            tmp >>= if i == 0 { 4 } else { 5 };
        }
        let mut len = 13;
        while len > 0 && chars[len - 1] == b'.' {
            len -= 1;
        }
        for &c in &chars[..len] {
            f.write_fmt(format_args!("{}", c as char))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Name::new(s)
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Name::new(&s).map_err(serde::de::Error::custom)
    }
}

//! Node identity: the 8-byte hardware address (EUI-64 / extended address) and the
//! short hex suffix derived from it that tags every hello message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validation::{parse_hex_bytes, ValidationError};

/// Letter case of the 4-digit suffix. One node always uses one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SuffixCase {
    #[default]
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeIdentity {
    address: [u8; 8],
}

impl NodeIdentity {
    pub fn new(address: [u8; 8]) -> Self {
        Self { address }
    }

    pub fn address(&self) -> [u8; 8] {
        self.address
    }

    /// Last two bytes of the address as 4 hex characters, e.g. `ABCD`.
    pub fn suffix(&self, case: SuffixCase) -> String {
        let (hi, lo) = (self.address[6], self.address[7]);
        match case {
            SuffixCase::Upper => format!("{:02X}{:02X}", hi, lo),
            SuffixCase::Lower => format!("{:02x}{:02x}", hi, lo),
        }
    }
}

impl FromStr for NodeIdentity {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex_bytes::<8>("node.hardware_address", s).map(Self::new)
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.address.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_uses_last_two_bytes() {
        let id = NodeIdentity::new([0, 0, 0, 0, 0, 0, 0xAB, 0xCD]);
        assert_eq!(id.suffix(SuffixCase::Upper), "ABCD");
        assert_eq!(id.suffix(SuffixCase::Lower), "abcd");
    }

    #[test]
    fn parse_and_display() {
        let id: NodeIdentity = "00-12-4B-00-01-02-0A-0B".parse().unwrap();
        assert_eq!(id.to_string(), "00:12:4b:00:01:02:0a:0b");
        assert_eq!(id.suffix(SuffixCase::Upper), "0A0B");
        assert!("00:12".parse::<NodeIdentity>().is_err());
    }
}

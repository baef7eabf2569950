use std::{
    fmt,
    str::FromStr,
};

use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};

const HEX_DIGITS: usize = 40;

/// An EVM-style account address, normalized to lowercase `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    MissingPrefix,
    WrongLength(usize),
    InvalidHex,
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::MissingPrefix => write!(f, "address must start with 0x"),
            AddressError::WrongLength(len) => {
                write!(f, "address must have {HEX_DIGITS} hex digits, got {len}")
            }
            AddressError::InvalidHex => write!(f, "address contains non-hex digits"),
        }
    }
}

impl std::error::Error for AddressError {}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;
        if digits.len() != HEX_DIGITS {
            return Err(AddressError::WrongLength(digits.len()));
        }
        hex::decode(digits).map_err(|_| AddressError::InvalidHex)?;
        Ok(Address(format!("0x{}", digits.to_ascii_lowercase())))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Address {
    pub fn zero() -> Self {
        Address(format!("0x{}", "0".repeat(HEX_DIGITS)))
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display, e.g. `0x1234..abcd`.
    pub fn short(&self) -> String {
        format!("{}..{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn from_str__normalizes_to_lowercase() {
        // given
        let mixed = "0xABCDef0123456789abcdef0123456789ABCDEF01";

        // when
        let address: Address = mixed.parse().unwrap();

        // then
        assert_eq!(
            address.as_str(),
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[test]
    fn from_str__rejects_missing_prefix_wrong_length_and_bad_hex() {
        let no_prefix = "abcdef0123456789abcdef0123456789abcdef01".parse::<Address>();
        assert_eq!(no_prefix, Err(AddressError::MissingPrefix));

        let too_short = "0xabc".parse::<Address>();
        assert_eq!(too_short, Err(AddressError::WrongLength(3)));

        let bad_hex = "0xZZcdef0123456789abcdef0123456789abcdef01".parse::<Address>();
        assert_eq!(bad_hex, Err(AddressError::InvalidHex));
    }

    #[test]
    fn is_zero__detects_the_zero_address() {
        assert!(Address::zero().is_zero());
        let real: Address = "0x0000000000000000000000000000000000000001"
            .parse()
            .unwrap();
        assert!(!real.is_zero());
    }

    #[test]
    fn short__keeps_leading_and_trailing_digits() {
        let address: Address = "0x1234567890abcdef1234567890abcdef12345678"
            .parse()
            .unwrap();
        assert_eq!(address.short(), "0x1234..5678");
    }
}

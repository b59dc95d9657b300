use crate::error::EconomicsError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const SNO_DECIMALS: u32 = 18;
pub const SNO_BASE_UNIT: u128 = 1_000_000_000_000_000_000; // 10^18

/// Token quantity in base units (18 decimals).
///
/// Human-readable formats carry the value as a decimal string of base units
/// because TOML and JSON integers cannot hold the full `u128` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u128::MAX);

    /// Whole tokens to base units
    pub const fn from_sno(sno: u64) -> Self {
        Self(sno as u128 * SNO_BASE_UNIT)
    }

    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    pub const fn to_base_units(&self) -> u128 {
        self.0
    }

    /// Lossy conversion for log fields
    pub fn to_sno(&self) -> f64 {
        self.0 as f64 / SNO_BASE_UNIT as f64
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Divides by `2^halvings`, reaching zero once every bit is shifted out.
    pub fn halved(&self, halvings: u128) -> Self {
        if halvings >= u128::BITS as u128 {
            Self::ZERO
        } else {
            Self(self.0 >> halvings)
        }
    }

    /// Number of whole `step`s contained in this amount.
    pub fn steps_of(&self, step: Self) -> Option<u128> {
        self.0.checked_div(step.0)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SNO_BASE_UNIT;
        let frac = self.0 % SNO_BASE_UNIT;
        if frac == 0 {
            write!(f, "{} SNO", whole)
        } else {
            let frac = format!("{:018}", frac);
            write!(f, "{}.{} SNO", whole, frac.trim_end_matches('0'))
        }
    }
}

impl FromStr for TokenAmount {
    type Err = EconomicsError;

    /// Accepts a base-unit integer (`"50000000000000000000000"`) or a whole
    /// token count with an `SNO` suffix (`"50000 SNO"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || EconomicsError::InvalidAmount(s.to_string());
        if let Some(tokens) = s.strip_suffix("SNO") {
            let tokens: u128 = tokens.trim().replace('_', "").parse().map_err(|_| invalid())?;
            tokens
                .checked_mul(SNO_BASE_UNIT)
                .map(Self)
                .ok_or_else(invalid)
        } else {
            s.replace('_', "").parse().map(Self).map_err(|_| invalid())
        }
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.0.to_string())
        } else {
            serializer.serialize_u128(self.0)
        }
    }
}

struct TokenAmountVisitor;

impl<'de> Visitor<'de> for TokenAmountVisitor {
    type Value = TokenAmount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a token amount as a string or unsigned integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(TokenAmount(v as u128))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Self::Value, E> {
        Ok(TokenAmount(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u128::try_from(v)
            .map(TokenAmount)
            .map_err(|_| E::custom("token amount cannot be negative"))
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(TokenAmountVisitor)
        } else {
            deserializer.deserialize_u128(TokenAmountVisitor)
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountAddress([u8; 32]);

impl AccountAddress {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Deterministic address derived from a seed, used for fixtures and
    /// test accounts.
    pub fn from_seed(seed: &[u8]) -> Self {
        Self(blake3::hash(seed).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, EconomicsError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| EconomicsError::InvalidAddress(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| EconomicsError::InvalidAddress(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Self(arr))
    }

    /// Holds every validator's locked stake.
    pub fn stake_escrow() -> Self {
        let mut bytes = [0xEE; 32];
        bytes[0] = 0x01;
        Self(bytes)
    }

    pub fn is_system(&self) -> bool {
        *self == Self::stake_escrow()
    }
}

impl FromStr for AccountAddress {
    type Err = EconomicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress(0x{}...)", hex::encode(&self.0[..6]))
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self)
        }
    }
}

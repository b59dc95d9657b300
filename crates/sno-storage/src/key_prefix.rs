//! Key layout of the state store.
//!
//! Every key starts with a fixed 10-byte prefix (the first bytes of
//! `blake3(name)`) followed by the entity id. Integer ids are big-endian so
//! that prefix scans return entities in id order.

use crate::backend::{Result, StorageError};

/// Fixed prefix length for all keys
pub const PREFIX_LEN: usize = 10;

lazy_static::lazy_static! {
    /// Validator records: `validator:{id_be}`
    pub static ref PREFIX_VALIDATOR: [u8; PREFIX_LEN] = hash_prefix(b"validator");

    /// Users: `user:{user_hash}`
    pub static ref PREFIX_USER: [u8; PREFIX_LEN] = hash_prefix(b"user");

    /// Jobs: `job:{job_id}`
    pub static ref PREFIX_JOB: [u8; PREFIX_LEN] = hash_prefix(b"job");

    /// Proposals: `proposal:{index_be}`
    pub static ref PREFIX_PROPOSAL: [u8; PREFIX_LEN] = hash_prefix(b"proposal");

    /// Balances: `balance:{address}`
    pub static ref PREFIX_BALANCE: [u8; PREFIX_LEN] = hash_prefix(b"balance");

    /// Allowances: `allowance:{owner}{spender}`
    pub static ref PREFIX_ALLOWANCE: [u8; PREFIX_LEN] = hash_prefix(b"allowance");

    /// Pending job assignments: `assignment:{job_id}`
    pub static ref PREFIX_ASSIGNMENT: [u8; PREFIX_LEN] = hash_prefix(b"assignment");

    /// Scalars such as total supply and emission epoch: `scalar:{name}`
    pub static ref PREFIX_SCALAR: [u8; PREFIX_LEN] = hash_prefix(b"scalar");
}

/// Hash a prefix string to a fixed 10-byte array
fn hash_prefix(prefix: &[u8]) -> [u8; PREFIX_LEN] {
    let hash = blake3::hash(prefix);
    let mut result = [0u8; PREFIX_LEN];
    result.copy_from_slice(&hash.as_bytes()[..PREFIX_LEN]);
    result
}

pub fn key(prefix: &[u8; PREFIX_LEN], id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(PREFIX_LEN + id.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(id);
    key
}

pub fn u64_key(prefix: &[u8; PREFIX_LEN], id: u64) -> Vec<u8> {
    key(prefix, &id.to_be_bytes())
}

/// The id part of `key`, if it carries `prefix`.
pub fn strip_prefix<'a>(prefix: &[u8; PREFIX_LEN], key: &'a [u8]) -> Option<&'a [u8]> {
    key.strip_prefix(prefix.as_slice())
}

pub fn parse_u64_id(prefix: &[u8; PREFIX_LEN], key: &[u8]) -> Result<u64> {
    let id = strip_prefix(prefix, key)
        .and_then(|id| <[u8; 8]>::try_from(id).ok())
        .ok_or_else(|| StorageError::CorruptKey(format!("{:02x?}", key)))?;
    Ok(u64::from_be_bytes(id))
}

pub fn parse_fixed_id<const N: usize>(prefix: &[u8; PREFIX_LEN], key: &[u8]) -> Result<[u8; N]> {
    strip_prefix(prefix, key)
        .and_then(|id| <[u8; N]>::try_from(id).ok())
        .ok_or_else(|| StorageError::CorruptKey(format!("{:02x?}", key)))
}

/// Decode a prefix hash back to its name (for debugging/tooling)
pub fn prefix_name(prefix: &[u8; PREFIX_LEN]) -> Option<&'static str> {
    [
        (&*PREFIX_VALIDATOR, "validator"),
        (&*PREFIX_USER, "user"),
        (&*PREFIX_JOB, "job"),
        (&*PREFIX_PROPOSAL, "proposal"),
        (&*PREFIX_BALANCE, "balance"),
        (&*PREFIX_ALLOWANCE, "allowance"),
        (&*PREFIX_ASSIGNMENT, "assignment"),
        (&*PREFIX_SCALAR, "scalar"),
    ]
    .into_iter()
    .find(|(p, _)| *p == prefix)
    .map(|(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_uniqueness() {
        let prefixes = vec![
            *PREFIX_VALIDATOR,
            *PREFIX_USER,
            *PREFIX_JOB,
            *PREFIX_PROPOSAL,
            *PREFIX_BALANCE,
            *PREFIX_ALLOWANCE,
            *PREFIX_ASSIGNMENT,
            *PREFIX_SCALAR,
        ];

        for i in 0..prefixes.len() {
            for j in (i + 1)..prefixes.len() {
                assert_ne!(
                    prefixes[i], prefixes[j],
                    "Prefix collision detected at indices {} and {}",
                    i, j
                );
            }
        }
    }

    #[test]
    fn test_prefix_decoder() {
        assert_eq!(prefix_name(&PREFIX_VALIDATOR), Some("validator"));
        assert_eq!(prefix_name(&PREFIX_SCALAR), Some("scalar"));
        assert_eq!(prefix_name(&[0xFF; PREFIX_LEN]), None);
    }

    #[test]
    fn test_integer_keys_sort_by_id() {
        let a = u64_key(&PREFIX_PROPOSAL, 2);
        let b = u64_key(&PREFIX_PROPOSAL, 256);
        assert!(a < b);
        assert_eq!(parse_u64_id(&PREFIX_PROPOSAL, &b).unwrap(), 256);
        assert!(parse_u64_id(&PREFIX_VALIDATOR, &b).is_err());
    }

    #[test]
    fn test_fixed_ids() {
        let k = key(&PREFIX_JOB, &[7u8; 32]);
        assert_eq!(parse_fixed_id::<32>(&PREFIX_JOB, &k).unwrap(), [7u8; 32]);
        assert!(parse_fixed_id::<64>(&PREFIX_JOB, &k).is_err());
    }
}

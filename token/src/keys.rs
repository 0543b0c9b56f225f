//! Deterministic ledger keys.
//!
//! Keys are composite: `\0objectType\0attr_1\0..\0attr_n\0`, so distinct
//! attribute lists never collide as long as attributes carry no `\0`.

use sha3::{Digest, Sha3_256};

use crate::errors::{Error, Result};

pub const TOKEN_KEY_PREFIX: &str = "ztoken";
pub const NULLIFIER_KEY_PREFIX: &str = "znullifier";
pub const TOKEN_REQUEST_KEY_PREFIX: &str = "token_request";
pub const SETUP_KEY_PREFIX: &str = "setup";

/// Metadata tag naming the action that wrote a token.
pub const ACTION: &str = "action";
pub const ACTION_ISSUE: &str = "issue";
pub const ACTION_TRANSFER: &str = "transfer";

const MIN_UNICODE_RUNE: char = '\u{0}';
const MAX_UNICODE_RUNE: char = '\u{10FFFF}';
const COMPOSITE_KEY_NAMESPACE: char = '\u{0}';

fn validate_attribute(attribute: &str) -> Result<()> {
    if attribute.is_empty() {
        return Err(Error::Format("empty key attribute".into()));
    }
    if attribute.contains(MIN_UNICODE_RUNE) || attribute.contains(MAX_UNICODE_RUNE) {
        return Err(Error::Format(format!(
            "key attribute {:?} contains a reserved character",
            attribute
        )));
    }
    Ok(())
}

pub fn composite_key(object_type: &str, attributes: &[&str]) -> Result<String> {
    validate_attribute(object_type)?;
    let mut key = String::new();
    key.push(COMPOSITE_KEY_NAMESPACE);
    key.push_str(object_type);
    key.push(MIN_UNICODE_RUNE);
    for attribute in attributes {
        validate_attribute(attribute)?;
        key.push_str(attribute);
        key.push(MIN_UNICODE_RUNE);
    }
    Ok(key)
}

/// Checks that `anchor` can be used as a key attribute.
pub fn validate_anchor(anchor: &str) -> Result<()> {
    validate_attribute(anchor).map_err(|e| e.context("invalid anchor"))
}

/// Key of the `index`-th output created under `anchor`.
pub fn token_key(anchor: &str, index: u64) -> Result<String> {
    composite_key(TOKEN_KEY_PREFIX, &[anchor, &index.to_string()])
}

/// Splits a key built by [`token_key`] back into its anchor and index.
pub fn split_token_key(key: &str) -> Result<(&str, u64)> {
    let malformed = || Error::Format(format!("{:?} is not a token key", key));
    let prefix = format!("{}{}{}", COMPOSITE_KEY_NAMESPACE, TOKEN_KEY_PREFIX, MIN_UNICODE_RUNE);
    let attributes = key
        .strip_prefix(prefix.as_str())
        .and_then(|rest| rest.strip_suffix(MIN_UNICODE_RUNE))
        .ok_or_else(malformed)?;
    let (anchor, index) = attributes.split_once(MIN_UNICODE_RUNE).ok_or_else(malformed)?;
    let index: u64 = index.parse().map_err(|_| malformed())?;
    if token_key(anchor, index)? != key {
        return Err(malformed());
    }
    Ok((anchor, index))
}

/// Key marking the token stored under `token_key` as spent.
pub fn nullifier_key(token_key: &str) -> Result<String> {
    if token_key.is_empty() {
        return Err(Error::Format("empty token key".into()));
    }
    let digest = Sha3_256::digest(token_key.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    composite_key(NULLIFIER_KEY_PREFIX, &[&hex])
}

/// Key recording the request committed under `anchor`.
pub fn token_request_key(anchor: &str) -> Result<String> {
    composite_key(TOKEN_REQUEST_KEY_PREFIX, &[anchor])
}

pub fn setup_key() -> Result<String> {
    composite_key(SETUP_KEY_PREFIX, &[])
}

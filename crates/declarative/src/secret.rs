//! Sensitive parameter values
//!
//! A [`SecretValue`] never renders its contents through `Debug` or
//! `Display`, so it is safe to pass resources and parameter maps to log
//! macros. The only way to read the value is [`SecretValue::expose`], which
//! store implementations call when they persist it.

use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker printed in place of a secret.
pub const REDACTED: &str = "***";

/// Where a secret came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretOrigin {
    /// Supplied verbatim in the template or on the command line
    Supplied,
    /// Generated when the template was loaded
    Generated,
}

/// Alphabet used for generated secrets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    /// `[A-Za-z0-9]`
    #[default]
    Alphanumeric,
    /// Lowercase hexadecimal
    Hex,
}

/// A value that must never be logged or echoed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue {
    value: String,
    origin: SecretOrigin,
}

impl SecretValue {
    /// Wrap a caller-supplied value.
    pub fn supplied(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            origin: SecretOrigin::Supplied,
        }
    }

    /// Generate a fresh random value of `length` characters.
    pub fn generate(length: usize, charset: Charset) -> Self {
        let mut rng = rand::thread_rng();
        let value = match charset {
            Charset::Alphanumeric => (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(length)
                .map(char::from)
                .collect(),
            Charset::Hex => {
                let mut bytes = vec![0u8; length.div_ceil(2)];
                rng.fill(bytes.as_mut_slice());
                let mut encoded = hex::encode(bytes);
                encoded.truncate(length);
                encoded
            }
        };

        Self {
            value,
            origin: SecretOrigin::Generated,
        }
    }

    /// Read the plaintext. Only store implementations should call this.
    pub fn expose(&self) -> &str {
        &self.value
    }

    pub fn origin(&self) -> SecretOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretValue")
            .field("value", &REDACTED)
            .field("origin", &self.origin)
            .finish()
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

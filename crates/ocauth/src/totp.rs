//! RFC 6238 one-time passwords for `token` fields.

use crate::error::OtpError;
use base32::Alphabet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use totp_lite::{totp_custom, Sha1, Sha256, Sha512};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

/// A decoded TOTP key plus its generation parameters.
#[derive(Clone)]
pub struct TotpSeed {
    key: Vec<u8>,
    algorithm: HashAlgorithm,
    digits: u32,
    step: u64,
}

impl TotpSeed {
    /// Decodes a Base32 secret as shown by authenticator enrolment pages.
    ///
    /// Spaces and `=` padding are ignored and lower case is accepted.
    pub fn new(secret: &str) -> Result<Self, OtpError> {
        let normalized: String = secret
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '=')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.is_empty()
            || !normalized
                .chars()
                .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c))
        {
            return Err(OtpError::InvalidBase32);
        }

        let key = base32::decode(Alphabet::RFC4648 { padding: false }, &normalized)
            .filter(|k| !k.is_empty())
            .ok_or(OtpError::InvalidBase32)?;

        Ok(Self {
            key,
            algorithm: HashAlgorithm::Sha1,
            digits: 6,
            step: 30,
        })
    }

    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_digits(mut self, digits: u32) -> Result<Self, OtpError> {
        if !(6..=8).contains(&digits) {
            return Err(OtpError::InvalidDigits(digits));
        }
        self.digits = digits;
        Ok(self)
    }

    pub fn with_step(mut self, step: u64) -> Result<Self, OtpError> {
        if step == 0 {
            return Err(OtpError::InvalidStep);
        }
        self.step = step;
        Ok(self)
    }

    /// Code valid at `unix_secs`.
    pub fn code_at(&self, unix_secs: u64) -> String {
        match self.algorithm {
            HashAlgorithm::Sha1 => totp_custom::<Sha1>(self.step, self.digits, &self.key, unix_secs),
            HashAlgorithm::Sha256 => {
                totp_custom::<Sha256>(self.step, self.digits, &self.key, unix_secs)
            }
            HashAlgorithm::Sha512 => {
                totp_custom::<Sha512>(self.step, self.digits, &self.key, unix_secs)
            }
        }
    }

    pub fn code_now(&self) -> Result<String, OtpError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| OtpError::TimeError)?
            .as_secs();
        Ok(self.code_at(now))
    }
}

impl fmt::Debug for TotpSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TotpSeed")
            .field("algorithm", &self.algorithm)
            .field("digits", &self.digits)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

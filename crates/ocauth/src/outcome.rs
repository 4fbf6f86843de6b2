//! Classification of the engine's terminal signal.
//!
//! Engines in the OpenConnect family return `0` on success, `1` when the
//! form callback cancelled, and a negated `errno` on failure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Final return code of a negotiation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TerminalSignal(pub i32);

impl TerminalSignal {
    pub const SUCCESS: TerminalSignal = TerminalSignal(0);
    /// The form callback asked to stop.
    pub const CANCELLED: TerminalSignal = TerminalSignal(1);
    pub const PERMISSION_DENIED: TerminalSignal = TerminalSignal(-EPERM);
    pub const INVALID: TerminalSignal = TerminalSignal(-EINVAL);

    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for TerminalSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const EPERM: i32 = 1;
const ENOENT: i32 = 2;
const EIO: i32 = 5;
const EAGAIN: i32 = 11;
const EACCES: i32 = 13;
const EINVAL: i32 = 22;
const EPROTONOSUPPORT: i32 = 93;
const EOPNOTSUPP: i32 = 95;
const ENETDOWN: i32 = 100;
const ENETUNREACH: i32 = 101;
const ECONNRESET: i32 = 104;
const ETIMEDOUT: i32 = 110;
const ECONNREFUSED: i32 = 111;
const EHOSTUNREACH: i32 = 113;

/// What a caller should make of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    /// The server (or the resolver) refused the credentials. Not retried.
    AuthRejected,
    /// Transport trouble; the whole session may be attempted again.
    RetryableNetworkError,
    /// Bad configuration, or something the driver does not understand.
    FatalConfigError,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }

    pub fn is_retryable(self) -> bool {
        self == Outcome::RetryableNetworkError
    }

    /// Process exit code used by command-line front-ends.
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::AuthRejected => 2,
            Outcome::RetryableNetworkError => 3,
            Outcome::FatalConfigError => 4,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outcome::Success => "authentication succeeded",
            Outcome::AuthRejected => "authentication rejected",
            Outcome::RetryableNetworkError => "network error (retryable)",
            Outcome::FatalConfigError => "fatal configuration error",
        };
        f.write_str(text)
    }
}

fn lookup(code: i32) -> Option<Outcome> {
    let outcome = match code {
        0 => Outcome::Success,
        1 => Outcome::AuthRejected,
        c if c >= 0 => return None,
        c => match c.wrapping_neg() {
            EPERM | EACCES => Outcome::AuthRejected,
            EIO | EAGAIN | ENETDOWN | ENETUNREACH | ECONNRESET | ETIMEDOUT | ECONNREFUSED
            | EHOSTUNREACH => Outcome::RetryableNetworkError,
            ENOENT | EINVAL | EPROTONOSUPPORT | EOPNOTSUPP => Outcome::FatalConfigError,
            _ => return None,
        },
    };
    Some(outcome)
}

/// Maps a terminal signal to an outcome. Unknown signals are fatal.
pub fn classify(signal: TerminalSignal) -> Outcome {
    lookup(signal.0).unwrap_or(Outcome::FatalConfigError)
}

/// Whether `signal` has a defined meaning, as opposed to falling through to
/// the fatal default.
pub fn is_recognized(signal: TerminalSignal) -> bool {
    lookup(signal.0).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_signals() {
        assert_eq!(classify(TerminalSignal(0)), Outcome::Success);
        assert_eq!(classify(TerminalSignal::CANCELLED), Outcome::AuthRejected);
        assert_eq!(classify(TerminalSignal(-1)), Outcome::AuthRejected);
        assert_eq!(classify(TerminalSignal(-13)), Outcome::AuthRejected);
        assert_eq!(classify(TerminalSignal(-5)), Outcome::RetryableNetworkError);
        assert_eq!(classify(TerminalSignal(-110)), Outcome::RetryableNetworkError);
        assert_eq!(classify(TerminalSignal(-111)), Outcome::RetryableNetworkError);
        assert_eq!(classify(TerminalSignal(-22)), Outcome::FatalConfigError);
        assert_eq!(classify(TerminalSignal(-93)), Outcome::FatalConfigError);
    }

    #[test]
    fn test_unknown_signals_are_fatal_and_unrecognized() {
        for code in [2, 77, -9999, i32::MIN, i32::MAX] {
            let signal = TerminalSignal(code);
            assert_eq!(classify(signal), Outcome::FatalConfigError);
            assert!(!is_recognized(signal), "{code} should be unrecognized");
        }
        assert!(is_recognized(TerminalSignal::SUCCESS));
        assert!(is_recognized(TerminalSignal::INVALID));
    }

    #[test]
    fn test_classify_is_pure() {
        for code in -200..=5 {
            let signal = TerminalSignal(code);
            assert_eq!(classify(signal), classify(signal));
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::Success.exit_code(), 0);
        assert_eq!(Outcome::AuthRejected.exit_code(), 2);
        assert_eq!(Outcome::RetryableNetworkError.exit_code(), 3);
        assert_eq!(Outcome::FatalConfigError.exit_code(), 4);
        assert!(Outcome::RetryableNetworkError.is_retryable());
        assert!(!Outcome::AuthRejected.is_retryable());
    }
}

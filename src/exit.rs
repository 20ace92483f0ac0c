//! Classification of in-container exit codes.
//!
//! The package manager uses a handful of non-zero exit codes to signal
//! conditions that are not failures, e.g. "updates are available" or
//! "a reboot is required". Everything else is treated as a genuine failure.

/// `zypper` finished, updates are pending.
pub const EXIT_INF_UPDATE_NEEDED: i64 = 100;
/// `zypper` finished, security updates are pending.
pub const EXIT_INF_SEC_UPDATE_NEEDED: i64 = 101;
/// A reboot is needed after the installed patches.
pub const EXIT_INF_REBOOT_NEEDED: i64 = 102;
/// The package manager itself was updated and has to be restarted.
pub const EXIT_INF_RESTART_NEEDED: i64 = 103;
/// `zypper` was terminated by a signal after cleaning up.
pub const EXIT_ON_SIGNAL: i64 = 105;

const INFORMATIONAL: [i64; 5] = [
    EXIT_INF_UPDATE_NEEDED,
    EXIT_INF_SEC_UPDATE_NEEDED,
    EXIT_INF_REBOOT_NEEDED,
    EXIT_INF_RESTART_NEEDED,
    EXIT_ON_SIGNAL,
];

/// Severity of an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSeverity {
    /// The command succeeded.
    Ok,
    /// The command signals a condition through its exit code without failing.
    Informational,
    /// The command failed.
    Severe,
}

impl ExitSeverity {
    pub fn is_severe(self) -> bool {
        matches!(self, ExitSeverity::Severe)
    }
}

/// Maps an exit code to its [`ExitSeverity`].
///
/// # Examples
///
/// ```
/// # use zypper_docker::exit::{classify, ExitSeverity};
/// assert_eq!(classify(0), ExitSeverity::Ok);
/// assert_eq!(classify(101), ExitSeverity::Informational);
/// assert_eq!(classify(1), ExitSeverity::Severe);
/// ```
pub fn classify(code: i64) -> ExitSeverity {
    match code {
        0 => ExitSeverity::Ok,
        c if INFORMATIONAL.contains(&c) => ExitSeverity::Informational,
        _ => ExitSeverity::Severe,
    }
}

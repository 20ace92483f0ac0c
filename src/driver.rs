//! Package-manager driver selection.
//!
//! A driver knows which shell command implements an operation inside the image
//! and how to interpret the command's exit codes.
use std::fmt;

use crate::exit;

/// Operations a driver can produce a command for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Install all available package updates.
    Update,
    /// Install all needed patches.
    Patch,
    /// Print the available package updates.
    ListUpdates,
    /// Print the needed patches.
    ListPatches,
    /// Exit with an informational code when patches are needed.
    CheckPatches,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Update => "update",
            Operation::Patch => "patch",
            Operation::ListUpdates => "list-updates",
            Operation::ListPatches => "list-patches",
            Operation::CheckPatches => "patch-check",
        };
        f.write_str(name)
    }
}

/// Supported package managers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Driver {
    #[default]
    Zypper,
}

impl Driver {
    /// Returns the shell command implementing `operation`.
    pub fn command(&self, operation: Operation) -> String {
        match self {
            Driver::Zypper => {
                let action = match operation {
                    Operation::Update => "--non-interactive update --auto-agree-with-licenses",
                    Operation::Patch => "--non-interactive patch --auto-agree-with-licenses",
                    Operation::ListUpdates => "list-updates",
                    Operation::ListPatches => "list-patches",
                    Operation::CheckPatches => "patch-check",
                };
                format!("zypper ref && zypper {action}")
            }
        }
    }

    /// Command that only succeeds when the package manager is installed.
    pub fn probe_command(&self) -> &'static str {
        match self {
            Driver::Zypper => "zypper --version",
        }
    }

    pub fn is_exit_code_severe(&self, code: i64) -> bool {
        match self {
            Driver::Zypper => exit::classify(code).is_severe(),
        }
    }
}

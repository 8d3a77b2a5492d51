// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fmt;

/// Why the process was asked to go down. The code is the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownReason {
    #[default]
    Poweroff,
    Reboot,
    /// Not supported: logged and ignored
    Suspend,
}

impl ShutdownReason {
    pub fn code(self) -> i32 {
        match self {
            ShutdownReason::Poweroff => 0,
            ShutdownReason::Reboot => 1,
            ShutdownReason::Suspend => 2,
        }
    }

    /// Whether this reason stops the pipelines
    pub fn stops_pipelines(self) -> bool {
        !matches!(self, ShutdownReason::Suspend)
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShutdownReason::Poweroff => "poweroff",
            ShutdownReason::Reboot => "reboot",
            ShutdownReason::Suspend => "suspend",
        };
        f.write_str(s)
    }
}

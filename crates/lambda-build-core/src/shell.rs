/// Shell idioms that differ between host families.
///
/// Resolved once at startup with [`ShellIdiom::host`] and passed explicitly to
/// command templating and the process runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellIdiom {
    /// Directory-creation command, substituted for `{mkdir}`.
    pub mkdir: &'static str,
    /// Operator chaining two commands, substituted for `{chain_operator}`.
    pub chain_operator: &'static str,
    /// Shell program used to run a command string.
    pub program: &'static str,
    /// Flag telling `program` to execute the following argument.
    pub command_flag: &'static str,
}

impl ShellIdiom {
    pub const fn posix() -> Self {
        Self {
            mkdir: "mkdir -p",
            chain_operator: "&&",
            program: "sh",
            command_flag: "-c",
        }
    }

    pub const fn windows() -> Self {
        Self {
            mkdir: "mkdir",
            chain_operator: ";",
            program: "cmd",
            command_flag: "/C",
        }
    }

    /// The idiom for the operating system this binary was built for.
    pub const fn host() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else {
            Self::posix()
        }
    }
}

impl Default for ShellIdiom {
    fn default() -> Self {
        Self::host()
    }
}

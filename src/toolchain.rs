use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// The pair of wrapped command line tools a deploy script calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Toolchain {
    /// PuTTY's `pscp` and `plink`. Both take the password as `-pw`.
    Putty,
    /// OpenSSH's `scp` and `ssh`, wrapped by `sshpass` when a password is set.
    OpenSsh,
}

impl Toolchain {
    // what the machine we run on usually has installed
    pub fn native() -> Toolchain {
        if cfg!(windows) {
            Toolchain::Putty
        } else {
            Toolchain::OpenSsh
        }
    }

    pub fn copy_program(&self) -> &'static str {
        match self {
            Toolchain::Putty => "pscp",
            Toolchain::OpenSsh => "scp",
        }
    }

    pub fn shell_program(&self) -> &'static str {
        match self {
            Toolchain::Putty => "plink",
            Toolchain::OpenSsh => "ssh",
        }
    }

    // scp takes -P, ssh takes -p. PuTTY uses -P for both.
    pub fn port_flag(&self, for_copy: bool) -> &'static str {
        match (self, for_copy) {
            (Toolchain::OpenSsh, false) => "-p",
            _ => "-P",
        }
    }
}

impl fmt::Display for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Toolchain::Putty => f.write_str("putty"),
            Toolchain::OpenSsh => f.write_str("openssh"),
        }
    }
}

impl FromStr for Toolchain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "putty" => Ok(Toolchain::Putty),
            "openssh" | "ssh" => Ok(Toolchain::OpenSsh),
            other => Err(format!(
                "unknown toolchain '{other}', expected 'putty' or 'openssh'"
            )),
        }
    }
}

// config files spell it the same ways the command line does
impl TryFrom<String> for Toolchain {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

const CMD_ARGS: &[&str] = &["/C"];
const SH_ARGS: &[&str] = &[];

/// Dialect of the temporary script, which decides how it is quoted and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Batch,
    Shell,
}

impl ScriptKind {
    pub fn native() -> ScriptKind {
        if cfg!(windows) {
            ScriptKind::Batch
        } else {
            ScriptKind::Shell
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ScriptKind::Batch => ".bat",
            ScriptKind::Shell => ".sh",
        }
    }

    // program and leading args; the script path goes last
    pub fn interpreter(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            ScriptKind::Batch => ("cmd", CMD_ARGS),
            ScriptKind::Shell => ("sh", SH_ARGS),
        }
    }

    pub fn line_ending(&self) -> &'static str {
        match self {
            ScriptKind::Batch => "\r\n",
            ScriptKind::Shell => "\n",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptKind::Batch => f.write_str("batch"),
            ScriptKind::Shell => f.write_str("shell"),
        }
    }
}

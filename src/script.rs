// Renders the throwaway script that drives the wrapped tools.
//
// Layout, whatever the dialect:
//   echo progress
//   <copy tool> -r <local dir> <user@host:remote path/>
//   on success: <shell tool> <user@host> <remote command>
//   on failure: exit 1
//
// The script's exit status is the remote command's, or 1 if the upload failed.

use std::path::Path;

use crate::config::{Connection, DeployConfig, Secret};
use crate::error::{DeployError, Result};
use crate::toolchain::{ScriptKind, Toolchain};

// sshpass -e reads the password from here, so it never lands in the script text
pub const SSHPASS_ENV: &str = "SSHPASS";

const REDACTED: &str = "******";

pub struct Script {
    kind: ScriptKind,
    text: String,
    redacted: String,
    env: Vec<(&'static str, Secret)>,
}

impl Script {
    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    // same script with the password blanked out, safe to print
    pub fn redacted(&self) -> &str {
        &self.redacted
    }

    // extra environment the interpreter must run with
    pub fn env(&self) -> &[(&'static str, Secret)] {
        &self.env
    }

    #[cfg(test)]
    pub fn raw(kind: ScriptKind, text: &str) -> Script {
        Script {
            kind,
            text: text.to_string(),
            redacted: text.to_string(),
            env: Vec::new(),
        }
    }
}

pub fn render(config: &DeployConfig) -> Result<Script> {
    let kind = config.script_kind;
    let conn = &config.connection;
    let local_dir = path_str(&config.local_dir, kind)?;

    let mut upload = Line::new(kind);
    let mut remote = Line::new(kind);
    let mut env = Vec::new();

    match config.toolchain {
        Toolchain::Putty => {
            upload.word(Toolchain::Putty.copy_program());
            auth_putty(&mut upload, conn, true)?;
            remote.word(Toolchain::Putty.shell_program());
            auth_putty(&mut remote, conn, false)?;
        }
        Toolchain::OpenSsh => {
            if let Some(password) = &conn.password {
                upload.word("sshpass -e");
                remote.word("sshpass -e");
                env.push((SSHPASS_ENV, password.clone()));
            }
            upload.word(Toolchain::OpenSsh.copy_program());
            remote.word(Toolchain::OpenSsh.shell_program());
            if let Some(port) = conn.port {
                upload.word(Toolchain::OpenSsh.port_flag(true));
                upload.word(&port.to_string());
                remote.word(Toolchain::OpenSsh.port_flag(false));
                remote.word(&port.to_string());
            }
        }
    }
    upload.word("-r");
    upload.value("local directory", local_dir)?;
    upload.value("upload target", &conn.upload_target())?;

    remote.value("target", &conn.target())?;
    remote.value("remote command", &config.remote_cmd)?;

    let (text, redacted) = match kind {
        ScriptKind::Batch => (
            batch(&upload.text, &remote.text),
            batch(&upload.redacted, &remote.redacted),
        ),
        ScriptKind::Shell => (
            shell(&upload.text, &remote.text),
            shell(&upload.redacted, &remote.redacted),
        ),
    };
    Ok(Script {
        kind,
        text,
        redacted,
        env,
    })
}

fn auth_putty(line: &mut Line, conn: &Connection, for_copy: bool) -> Result<()> {
    if let Some(port) = conn.port {
        line.word(Toolchain::Putty.port_flag(for_copy));
        line.word(&port.to_string());
    }
    if let Some(password) = &conn.password {
        line.word("-pw");
        line.secret("password", password)?;
    }
    Ok(())
}

fn batch(upload: &str, remote: &str) -> String {
    [
        "@echo off",
        "echo Uploading build...",
        upload,
        "if %ERRORLEVEL% EQU 0 (",
        "    echo Upload successful!",
        format!("    {remote}").as_str(),
        ") else (",
        "    echo Upload failed!",
        "    exit /b 1",
        ")",
        "",
    ]
    .join(ScriptKind::Batch.line_ending())
}

fn shell(upload: &str, remote: &str) -> String {
    [
        "#!/bin/sh",
        "echo 'Uploading build...'",
        format!("if {upload}; then").as_str(),
        "    echo 'Upload successful!'",
        format!("    {remote}").as_str(),
        "else",
        "    echo 'Upload failed!'",
        "    exit 1",
        "fi",
        "",
    ]
    .join(ScriptKind::Shell.line_ending())
}

fn path_str(path: &Path, kind: ScriptKind) -> Result<&str> {
    path.to_str().ok_or(DeployError::UnsafeValue {
        field: "local directory",
        kind,
        reason: "path is not valid UTF-8",
    })
}

// One command line, built twice: for real and with secrets blanked.
struct Line {
    kind: ScriptKind,
    text: String,
    redacted: String,
}

impl Line {
    fn new(kind: ScriptKind) -> Line {
        Line {
            kind,
            text: String::new(),
            redacted: String::new(),
        }
    }

    // trusted text, goes in as is
    fn word(&mut self, w: &str) {
        self.push(w, w);
    }

    fn value(&mut self, field: &'static str, v: &str) -> Result<()> {
        let quoted = quote(self.kind, field, v)?;
        self.push(&quoted, &quoted);
        Ok(())
    }

    fn secret(&mut self, field: &'static str, s: &Secret) -> Result<()> {
        let quoted = quote(self.kind, field, s.expose())?;
        self.push(&quoted, REDACTED);
        Ok(())
    }

    fn push(&mut self, real: &str, shown: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
            self.redacted.push(' ');
        }
        self.text.push_str(real);
        self.redacted.push_str(shown);
    }
}

/// Quote `v` as one argument for the script dialect, or refuse if that can't be
/// done safely.
pub fn quote(kind: ScriptKind, field: &'static str, v: &str) -> Result<String> {
    let unsafe_value = |reason: &'static str| DeployError::UnsafeValue {
        field,
        kind,
        reason,
    };
    match kind {
        ScriptKind::Batch => {
            // cmd expands %VAR% even inside quotes and has no escape for "
            if v.contains('"') {
                return Err(unsafe_value("contains a double quote"));
            }
            if v.contains('%') {
                return Err(unsafe_value("contains a percent sign"));
            }
            if v.chars().any(char::is_control) {
                return Err(unsafe_value("contains a control character"));
            }
            Ok(format!("\"{v}\""))
        }
        ScriptKind::Shell => {
            if v.contains(|c: char| matches!(c, '\0' | '\n' | '\r')) {
                return Err(unsafe_value("contains a line break or NUL"));
            }
            Ok(format!("'{}'", v.replace('\'', r"'\''")))
        }
    }
}

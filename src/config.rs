use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ArgMatches;
use serde::Deserialize;

use crate::error::{DeployError, Result};
use crate::script;
use crate::toolchain::{ScriptKind, Toolchain};

pub const DEFAULT_LOCAL_DIR: &str = "web/dist";
pub const DEFAULT_CONFIG_FILE: &str = "deploy.toml";

/// A password. Never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Secret {
        Secret(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(******)")
    }
}

/// Where the build goes.
#[derive(Debug, Clone)]
pub struct Connection {
    pub host: String,
    pub user: String,
    pub password: Option<Secret>,
    pub port: Option<u16>,
    pub remote_path: String,
}

impl Connection {
    // user@host, as both tool families expect it
    pub fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    // user@host:/remote/path/
    pub fn upload_target(&self) -> String {
        format!(
            "{}:{}/",
            self.target(),
            self.remote_path.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub connection: Connection,
    pub local_dir: PathBuf,
    pub remote_cmd: String,
    pub site_url: Option<String>,
    pub toolchain: Toolchain,
    pub script_kind: ScriptKind,
    pub script_dir: PathBuf,
}

/// One layer of settings. Command line (with env fallback handled by clap) and the
/// config file each produce one; `or` stacks them.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<Secret>,
    pub port: Option<u16>,
    pub remote_path: Option<String>,
    pub local_dir: Option<PathBuf>,
    pub remote_cmd: Option<String>,
    pub site_url: Option<String>,
    pub toolchain: Option<Toolchain>,
    pub script_dir: Option<PathBuf>,
}

impl Settings {
    pub fn from_matches(args: &ArgMatches) -> Result<Settings> {
        let string = |name: &str| args.value_of(name).map(str::to_string);
        let port = match args.value_of("port") {
            Some(p) => Some(
                p.parse::<u16>()
                    .map_err(|err| DeployError::Config(format!("invalid port '{p}': {err}")))?,
            ),
            None => None,
        };
        let toolchain = match args.value_of("toolchain") {
            Some(t) => Some(t.parse::<Toolchain>().map_err(DeployError::Config)?),
            None => None,
        };
        Ok(Settings {
            host: string("host"),
            user: string("user"),
            password: args.value_of("password").map(Secret::new),
            port,
            remote_path: string("remote-path"),
            local_dir: args.value_of("local-dir").map(PathBuf::from),
            remote_cmd: string("remote-cmd"),
            site_url: string("site-url"),
            toolchain,
            script_dir: args.value_of("script-dir").map(PathBuf::from),
        })
    }

    pub fn from_file(path: &Path) -> Result<Settings> {
        let text = fs::read_to_string(path).map_err(|source| DeployError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| DeployError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    // self wins, fields it lacks come from `lower`
    pub fn or(self, lower: Settings) -> Settings {
        Settings {
            host: self.host.or(lower.host),
            user: self.user.or(lower.user),
            password: self.password.or(lower.password),
            port: self.port.or(lower.port),
            remote_path: self.remote_path.or(lower.remote_path),
            local_dir: self.local_dir.or(lower.local_dir),
            remote_cmd: self.remote_cmd.or(lower.remote_cmd),
            site_url: self.site_url.or(lower.site_url),
            toolchain: self.toolchain.or(lower.toolchain),
            script_dir: self.script_dir.or(lower.script_dir),
        }
    }

    pub fn resolve(self) -> Result<DeployConfig> {
        let host = required(self.host, "host", "--host", "DEPLOY_HOST")?;
        let user = required(self.user, "user", "--user", "DEPLOY_USER")?;
        let remote_path = required(
            self.remote_path,
            "remote_path",
            "--remote-path",
            "DEPLOY_REMOTE_PATH",
        )?;
        let remote_cmd = match self.remote_cmd {
            Some(cmd) => cmd,
            // runs in the remote login shell, which is POSIX whatever we run on
            None => format!(
                "cd {} && echo 'Build deployed'",
                script::quote(ScriptKind::Shell, "remote path", &remote_path)?
            ),
        };
        Ok(DeployConfig {
            connection: Connection {
                host,
                user,
                // an empty password means "let the tool authenticate on its own"
                password: self.password.filter(|p| !p.expose().is_empty()),
                port: self.port,
                remote_path,
            },
            local_dir: self
                .local_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_DIR)),
            remote_cmd,
            site_url: self.site_url.filter(|u| !u.is_empty()),
            toolchain: self.toolchain.unwrap_or_else(Toolchain::native),
            script_kind: ScriptKind::native(),
            script_dir: self.script_dir.unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

fn required(value: Option<String>, key: &str, flag: &str, env: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(DeployError::Config(format!(
            "missing {key}: pass {flag}, set {env} or add `{key}` to the config file"
        ))),
    }
}

/// Command line and environment first, then the config file if there is one.
pub fn load(args: &ArgMatches) -> Result<DeployConfig> {
    load_with_default(args, Path::new(DEFAULT_CONFIG_FILE))
}

// `default_file` is read when `--config` is absent, and only if it exists
pub fn load_with_default(args: &ArgMatches, default_file: &Path) -> Result<DeployConfig> {
    let cli = Settings::from_matches(args)?;
    let file = match args.value_of("config") {
        Some(path) => Settings::from_file(Path::new(path))?,
        None if default_file.exists() => Settings::from_file(default_file)?,
        None => Settings::default(),
    };
    cli.or(file).resolve()
}

#[cfg(test)]
mod test {
    use super::*;

    fn minimal() -> Settings {
        Settings {
            host: Some("203.0.113.7".into()),
            user: Some("deploy".into()),
            remote_path: Some("/var/www/example.org/web".into()),
            ..Settings::default()
        }
    }

    #[test]
    fn test_resolve_defaults() {
        let config = minimal().resolve().unwrap();
        assert_eq!(config.local_dir, PathBuf::from("web/dist"));
        assert_eq!(
            config.remote_cmd,
            "cd '/var/www/example.org/web' && echo 'Build deployed'"
        );
        assert_eq!(config.toolchain, Toolchain::native());
        assert_eq!(config.script_dir, PathBuf::from("."));
        assert!(config.connection.password.is_none());
        assert!(config.site_url.is_none());
    }

    #[test]
    fn test_resolve_missing_required() {
        for strip in ["host", "user", "remote_path"] {
            let mut s = minimal();
            match strip {
                "host" => s.host = None,
                "user" => s.user = Some("  ".into()),
                _ => s.remote_path = None,
            }
            let err = s.resolve().unwrap_err();
            assert!(
                err.to_string().contains(&format!("missing {strip}")),
                "{err}"
            );
        }
    }

    #[test]
    fn test_default_remote_cmd_quotes_path() {
        let mut s = minimal();
        s.remote_path = Some("/srv/my site; rm -rf ~/it's".into());
        let config = s.resolve().unwrap();
        assert_eq!(
            config.remote_cmd,
            r"cd '/srv/my site; rm -rf ~/it'\''s' && echo 'Build deployed'"
        );

        let mut s = minimal();
        s.remote_path = Some("/srv/site\nreboot".into());
        assert!(matches!(
            s.resolve(),
            Err(DeployError::UnsafeValue { field: "remote path", .. })
        ));

        // an explicit command is taken as written
        let mut s = minimal();
        s.remote_path = Some("/srv/my site".into());
        s.remote_cmd = Some("systemctl reload nginx".into());
        assert_eq!(s.resolve().unwrap().remote_cmd, "systemctl reload nginx");
    }

    #[test]
    fn test_empty_password_is_none() {
        let mut s = minimal();
        s.password = Some(Secret::new(""));
        assert!(s.resolve().unwrap().connection.password.is_none());
    }

    #[test]
    fn test_or_prefers_upper_layer() {
        let upper = Settings {
            host: Some("cli.example.org".into()),
            port: Some(2222),
            ..Settings::default()
        };
        let lower = Settings {
            host: Some("file.example.org".into()),
            port: Some(22),
            user: Some("fromfile".into()),
            ..Settings::default()
        };
        let merged = upper.or(lower);
        assert_eq!(merged.host.as_deref(), Some("cli.example.org"));
        assert_eq!(merged.port, Some(2222));
        assert_eq!(merged.user.as_deref(), Some("fromfile"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.toml");
        fs::write(
            &path,
            r#"
host = "203.0.113.7"
user = "root"
password = "hunter2"
port = 2222
remote_path = "/srv/site"
toolchain = "putty"
site_url = "https://example.org"
"#,
        )
        .unwrap();
        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.host.as_deref(), Some("203.0.113.7"));
        assert_eq!(s.port, Some(2222));
        assert_eq!(s.toolchain, Some(Toolchain::Putty));
        assert_eq!(s.password.as_ref().map(Secret::expose), Some("hunter2"));
    }

    #[test]
    fn test_from_file_toolchain_spellings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.toml");
        for (value, expected) in [
            ("OpenSSH", Toolchain::OpenSsh),
            ("ssh", Toolchain::OpenSsh),
            ("PuTTY", Toolchain::Putty),
        ] {
            fs::write(&path, format!("toolchain = \"{value}\"\n")).unwrap();
            let s = Settings::from_file(&path).unwrap();
            assert_eq!(s.toolchain, Some(expected), "{value}");
        }

        fs::write(&path, "toolchain = \"ftp\"\n").unwrap();
        match Settings::from_file(&path) {
            Err(err @ DeployError::ConfigParse { .. }) => {
                assert!(err.to_string().contains("unknown toolchain"), "{err}")
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_file_rejects_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.toml");
        fs::write(&path, "hostname = \"x\"\n").unwrap();
        assert!(matches!(
            Settings::from_file(&path),
            Err(DeployError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Settings::from_file(&dir.path().join("nope.toml")),
            Err(DeployError::ConfigRead { .. })
        ));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let mut s = minimal();
        s.password = Some(Secret::new("hunter2"));
        let config = s.resolve().unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_upload_target() {
        let mut s = minimal();
        s.remote_path = Some("/srv/site/".into());
        let config = s.resolve().unwrap();
        assert_eq!(config.connection.target(), "deploy@203.0.113.7");
        assert_eq!(
            config.connection.upload_target(),
            "deploy@203.0.113.7:/srv/site/"
        );
    }
}

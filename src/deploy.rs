use std::io::{self, Write};

use tracing::{debug, info, warn};

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::output::humanize_elapsed;
use crate::runner::Runner;
use crate::script;
use crate::script_file::ScriptFile;

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Deployed {
        site_url: Option<String>,
    },
    // The script ran and exited non-zero. stderr is the wrapped tools', verbatim,
    // or their stdout if they said nothing on stderr.
    Failed {
        code: Option<i32>,
        stderr: String,
    },
    // anything that stopped us before the script could finish
    Error(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Deployed { .. })
    }

    // What `--exit-code` exits with: the script's own status when it has one.
    pub fn exit_status(&self) -> i32 {
        match self {
            Outcome::Deployed { .. } => 0,
            Outcome::Failed {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }

    pub fn report(&self, out: &mut impl Write) -> io::Result<()> {
        match self {
            Outcome::Deployed { site_url, .. } => {
                writeln!(out, "\n✅ Build deployed successfully!")?;
                if let Some(url) = site_url {
                    writeln!(out, "🔗 Visit: {url}\n")?;
                }
            }
            Outcome::Failed { stderr, .. } => {
                writeln!(out, "\n❌ Deployment failed: {stderr}")?;
            }
            Outcome::Error(msg) => {
                writeln!(out, "❌ Error: {msg}")?;
            }
        }
        out.flush()
    }
}

/// Upload the build and poke the server, via a throwaway script.
///
/// Never fails: every error ends up as `Outcome::Error`. The script file is gone
/// by the time this returns.
pub fn deploy(config: &DeployConfig, runner: &dyn Runner, out: &mut impl Write) -> Outcome {
    match run(config, runner, out) {
        Ok(outcome) => outcome,
        Err(err) => {
            debug!("Deploy aborted: {err:?}");
            Outcome::Error(err.to_string())
        }
    }
}

fn run(config: &DeployConfig, runner: &dyn Runner, out: &mut impl Write) -> Result<Outcome> {
    writeln!(out, "📦 Deploying build to production server...\n")?;
    writeln!(out, "1️⃣ Copying build files...")?;
    out.flush()?;

    // everything that can be checked locally, before a file or a connection exists
    if !config.local_dir.is_dir() {
        return Err(DeployError::MissingLocalDir(config.local_dir.clone()));
    }
    let script = script::render(config)?;

    info!(
        dest = %config.connection.target(),
        toolchain = %config.toolchain,
        "Deploying {} to {}",
        config.local_dir.display(),
        config.connection.remote_path,
    );

    let file = ScriptFile::create(&config.script_dir, script.kind(), script.text())?;
    let script_path = file.path().to_path_buf();
    debug!("Wrote {}", script_path.display());

    let result = runner.run(&file, &script, out);
    if let Err(err) = file.remove() {
        warn!("Could not remove {}: {err}", script_path.display());
    }
    let output = result?;

    info!(
        code = ?output.code,
        "Wrapped tools finished in {}",
        humanize_elapsed(output.elapsed)
    );
    if output.success() {
        Ok(Outcome::Deployed {
            site_url: config.site_url.clone(),
        })
    } else if output.stderr.is_empty() {
        // a batch script's "Upload failed!" only ever reaches stdout
        Ok(Outcome::Failed {
            code: output.code,
            stderr: output.stdout,
        })
    } else {
        Ok(Outcome::Failed {
            code: output.code,
            stderr: output.stderr,
        })
    }
}

use std::io;
use std::process;

use clap::arg;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod config;

mod deploy;
use deploy::deploy;

mod error;

mod output;

mod progress_message;

mod runner;
use runner::{DryRun, Runner, ShellRunner};

mod script;

mod script_file;

mod toolchain;

const DESC: &str = r#"Upload a local build directory to a web server, then run a command there.
Example: deploy-build --host 203.0.113.7 --user root --remote-path /var/www/example.org/web
Every option can also come from a DEPLOY_* environment variable or deploy.toml."#;

fn cli() -> clap::Command<'static> {
    clap::Command::new("deploy-build")
        .about(DESC)
        .arg(
            arg!(--host <HOST> "Server to deploy to")
                .required(false)
                .env("DEPLOY_HOST"),
        )
        .arg(
            arg!(--user <USER> "Login on the server")
                .required(false)
                .env("DEPLOY_USER"),
        )
        .arg(
            arg!(--password <PASSWORD> "Password for both tools. Leave unset to use keys")
                .required(false)
                .env("DEPLOY_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            arg!(--port <PORT> "SSH port")
                .required(false)
                .env("DEPLOY_PORT"),
        )
        .arg(
            arg!(--"remote-path" <PATH> "Directory on the server the build is copied into")
                .required(false)
                .env("DEPLOY_REMOTE_PATH"),
        )
        .arg(
            arg!(--"local-dir" <DIR> "Build directory to upload [default: web/dist]")
                .required(false)
                .env("DEPLOY_LOCAL_DIR"),
        )
        .arg(
            arg!(--"remote-cmd" <CMD> "Command to run on the server after the upload")
                .required(false)
                .env("DEPLOY_REMOTE_CMD"),
        )
        .arg(
            arg!(--"site-url" <URL> "URL to print once deployed")
                .required(false)
                .env("DEPLOY_SITE_URL"),
        )
        .arg(
            arg!(--toolchain <TOOLS> "putty (pscp/plink) or openssh (scp/ssh)")
                .required(false)
                .env("DEPLOY_TOOLCHAIN"),
        )
        .arg(
            arg!(--"script-dir" <DIR> "Where to write the temporary script [default: .]")
                .required(false),
        )
        .arg(
            arg!(-c --config <FILE> "TOML config file [default: ./deploy.toml if present]")
                .required(false)
                .env("DEPLOY_CONFIG"),
        )
        .arg(arg!(--"dry-run" "Show the script we would run without running it").required(false))
        .arg(
            arg!(--"exit-code" "Exit non-zero if the deploy fails, with the script's status when known")
                .required(false),
        )
        .arg(arg!(-v --verbose "Debug level output, including the tools' output").required(false))
        .arg(
            arg!(-q --quiet "Only log errors")
                .required(false)
                .conflicts_with("verbose"),
        )
}

fn main() -> Result<(), anyhow::Error> {
    let args = cli().get_matches();

    // stdout is for the status lines, logs go to stderr
    let log_level = if args.is_present("verbose") {
        Level::DEBUG
    } else if args.is_present("quiet") {
        Level::ERROR
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = config::load(&args)?;

    let runner: Box<dyn Runner> = if args.is_present("dry-run") {
        Box::new(DryRun)
    } else {
        Box::new(ShellRunner)
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let outcome = deploy(&config, runner.as_ref(), &mut out);
    outcome.report(&mut out)?;
    drop(out);

    if args.is_present("exit-code") && !outcome.is_success() {
        process::exit(outcome.exit_status());
    }
    Ok(())
}

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};
use tracing::{debug, warn};

use crate::error::{DeployError, Result};
use crate::output;
use crate::progress_message::{Progress, Stream};
use crate::script::Script;
use crate::script_file::ScriptFile;

#[derive(Debug)]
pub struct RunOutput {
    // None if the interpreter was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait Runner {
    // Run the script already written to `file`, blocking until it exits.
    // `out` is the user's status stream.
    fn run(&self, file: &ScriptFile, script: &Script, out: &mut dyn Write) -> Result<RunOutput>;
}

/// Hands the script to `cmd /C` or `sh` and captures what the wrapped tools print.
pub struct ShellRunner;

impl Runner for ShellRunner {
    fn run(&self, file: &ScriptFile, script: &Script, _out: &mut dyn Write) -> Result<RunOutput> {
        let (program, args) = script.kind().interpreter();
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (name, value) in script.env() {
            cmd.env(name, value.expose());
        }
        debug!("Running {program} {}", file.path().display());

        let t_start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| DeployError::Spawn {
            program: program.to_string(),
            source,
        })?;

        // Drain both pipes at once. Reading one to the end first can deadlock
        // when the tool fills the other.
        let (sender, receiver) = unbounded::<Progress>();
        let readers = match start_readers(&mut child, sender) {
            Ok(readers) => readers,
            Err(err) => {
                // nobody would drain its pipes
                if let Err(wait_err) = reap(child) {
                    warn!("Could not stop {program}: {wait_err}");
                }
                return Err(err);
            }
        };

        let captured = output::collect(receiver);
        let status = child.wait()?;
        for reader in readers {
            if reader.join().is_err() {
                warn!("Output reader thread panicked");
            }
        }

        Ok(RunOutput {
            code: status.code(),
            stdout: captured.stdout,
            stderr: captured.stderr,
            elapsed: t_start.elapsed(),
        })
    }
}

fn start_readers(
    child: &mut Child,
    sender: Sender<Progress>,
) -> Result<Vec<thread::JoinHandle<()>>> {
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(Stream::Stdout, stdout, sender.clone())?);
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(Stream::Stderr, stderr, sender)?);
    }
    Ok(readers)
}

// Kill a child we can no longer look after and collect its status.
fn reap(mut child: Child) -> io::Result<ExitStatus> {
    if let Err(err) = child.kill() {
        // already exited
        debug!("kill: {err}");
    }
    child.wait()
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: Stream,
    pipe: R,
    sender: Sender<Progress>,
) -> Result<thread::JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("{stream} reader"))
        .spawn(move || {
            let mut reader = BufReader::new(pipe);
            let mut buf = Vec::with_capacity(256);
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        // tools on Windows print in the console code page, don't choke on it
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
                        if sender.send(Progress::Line(stream, line.to_string())).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = sender.send(Progress::ReadFailed(stream, err.to_string()));
                        break;
                    }
                }
            }
        })?;
    Ok(handle)
}

/// Writes the script out but runs nothing: prints what would happen and reports
/// success.
pub struct DryRun;

impl Runner for DryRun {
    fn run(&self, file: &ScriptFile, script: &Script, out: &mut dyn Write) -> Result<RunOutput> {
        let (program, args) = script.kind().interpreter();
        let mut cmdline = vec![program.to_string()];
        cmdline.extend(args.iter().map(|a| a.to_string()));
        cmdline.push(file.path().display().to_string());
        writeln!(out, "would run '{}':", cmdline.join(" "))?;
        for line in script.redacted().lines() {
            writeln!(out, "    {line}")?;
        }
        for (name, _) in script.env() {
            writeln!(out, "with {name} set in the environment")?;
        }
        out.flush()?;
        Ok(RunOutput {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            elapsed: Duration::ZERO,
        })
    }
}

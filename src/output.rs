use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

use crate::progress_message::{Progress, Stream};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
}

// Collects everything the pipe readers send until all of them hang up.
// Lines are echoed at debug level as they arrive.
pub fn collect(recv: Receiver<Progress>) -> Captured {
    use Progress::*;
    let mut captured = Captured::default();
    while let Ok(progress) = recv.recv() {
        match progress {
            Line(stream, line) => {
                debug!(%stream, "{line}");
                let buf = match stream {
                    Stream::Stdout => &mut captured.stdout,
                    Stream::Stderr => &mut captured.stderr,
                };
                buf.push_str(&line);
                buf.push('\n');
            }
            ReadFailed(stream, err) => {
                warn!(%stream, "Lost output of wrapped tool: {err}");
            }
        }
    }
    captured
}

pub fn humanize_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else {
        let secs = elapsed.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod test {
    use crossbeam_channel::unbounded;

    use super::*;

    #[test]
    fn test_collect_splits_streams() {
        let (sender, receiver) = unbounded();
        sender
            .send(Progress::Line(Stream::Stdout, "Uploading build...".into()))
            .unwrap();
        sender
            .send(Progress::Line(Stream::Stderr, "Access denied".into()))
            .unwrap();
        sender
            .send(Progress::ReadFailed(Stream::Stdout, "broken pipe".into()))
            .unwrap();
        sender
            .send(Progress::Line(Stream::Stdout, "Upload failed!".into()))
            .unwrap();
        drop(sender);

        let captured = collect(receiver);
        assert_eq!(captured.stdout, "Uploading build...\nUpload failed!\n");
        assert_eq!(captured.stderr, "Access denied\n");
    }

    #[test]
    fn test_collect_nothing() {
        let (sender, receiver) = unbounded::<Progress>();
        drop(sender);
        assert_eq!(collect(receiver), Captured::default());
    }

    #[test]
    fn test_humanize_elapsed() {
        assert_eq!(humanize_elapsed(Duration::from_millis(850)), "850ms");
        assert_eq!(humanize_elapsed(Duration::from_millis(3400)), "3.4s");
        assert_eq!(humanize_elapsed(Duration::from_secs(125)), "2m 5s");
    }
}

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => f.write_str("stdout"),
            Stream::Stderr => f.write_str("stderr"),
        }
    }
}

pub enum Progress {
    // one line from the wrapped tools, line ending stripped
    Line(Stream, String),
    // reading the pipe failed, the reader has stopped. value is the error text.
    ReadFailed(Stream, String),
}

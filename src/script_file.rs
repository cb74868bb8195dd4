use std::io::{self, Write};
use std::path::Path;

use tempfile::{Builder, TempPath};

use crate::error::Result;
use crate::toolchain::ScriptKind;

const PREFIX: &str = "deploy_temp";

/// The on-disk copy of a deploy script. The file is deleted when this is dropped,
/// so it cannot outlive the deploy whichever way the deploy ends.
pub struct ScriptFile {
    path: TempPath,
}

impl ScriptFile {
    // Create in `dir` and write `contents`. If the write fails the half-written
    // file is removed before the error comes back.
    pub fn create(dir: &Path, kind: ScriptKind, contents: &str) -> Result<ScriptFile> {
        let mut file = Builder::new()
            .prefix(PREFIX)
            .suffix(kind.extension())
            .tempfile_in(dir)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        // closes our handle, cmd.exe won't run a file someone holds open
        Ok(ScriptFile {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Delete now and report failure, instead of the silent delete on drop.
    pub fn remove(self) -> io::Result<()> {
        self.path.close()
    }
}

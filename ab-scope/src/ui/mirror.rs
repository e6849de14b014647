use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

/// Receives a copy of every console frame with markup removed.
pub trait ConsoleMirror {
    fn send_console(&mut self, text: &str) -> io::Result<()>;
}

/// Keeps the latest frame in a file, e.g. for `watch cat` on another host.
pub struct FileMirror {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl FileMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConsoleMirror for FileMirror {
    fn send_console(&mut self, text: &str) -> io::Result<()> {
        // readers never see a half-written frame
        fs::write(&self.tmp_path, text)?;
        fs::rename(&self.tmp_path, &self.path)
    }
}

//! Body file lookup.
//!
//! Response definitions can point at a body file by relative path (the path
//! itself may be a template). The renderer reads it through a [`FileSource`]
//! so tests and embedders can supply their own storage.

use std::io;
use std::path::{Component, Path, PathBuf};

pub trait FileSource: Send + Sync {
    fn read(&self, relative_path: &str) -> io::Result<Vec<u8>>;
}

/// Reads files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryFileSource {
    root: PathBuf,
}

impl DirectoryFileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative_path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(relative_path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        format!("body file path '{relative_path}' escapes the files root"),
                    ))
                }
            }
        }
        Ok(resolved)
    }
}

impl FileSource for DirectoryFileSource {
    fn read(&self, relative_path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(relative_path)?)
    }
}

/// File source for setups without body files; every read fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFileSource;

impl FileSource for NoFileSource {
    fn read(&self, relative_path: &str) -> io::Result<Vec<u8>> {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no file source configured for '{relative_path}'"),
        ))
    }
}

use std::fmt;
use std::io;
use std::path::PathBuf;

//===----------------------------------------------------------------------===//
// LoadError
//===----------------------------------------------------------------------===//

/// Failure to bring a script file into the interpreter. Evaluation itself
/// never fails; only the filesystem boundary does.
#[derive(Debug)]
pub enum LoadError {
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::Io { path, source } => {
                write!(f, "cannot load {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
        }
    }
}

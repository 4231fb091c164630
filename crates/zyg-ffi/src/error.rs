use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ZygError {
    #[error("failed to load renderer library {path}: {source}")]
    Library {
        path: PathBuf,
        source: libloading::Error,
    },
    #[error("renderer library is missing symbol `{name}`: {source}")]
    Symbol {
        name: &'static str,
        source: libloading::Error,
    },
    #[error("a renderer library is already loaded in this process")]
    AlreadyLoaded,
    #[error("environment variable {0} is not set")]
    MissingLibraryDir(&'static str),
}

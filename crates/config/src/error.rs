use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not read configuration")]
    Extract,
    #[display("configuration file does not exist: {}", _0.display())]
    MissingFile(#[error(not(source))] PathBuf),
    #[display("unrecognized configuration format (expected .toml, .yaml or .json): {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] &'static str),
}

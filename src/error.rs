use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open document directory {}", _0.display())]
    DocsPath(#[error(not(source))] PathBuf),
    #[display("could not read {}", _0.display())]
    ReadInput(#[error(not(source))] PathBuf),
    #[display("{} is not a usable filename", _0.display())]
    InputName(#[error(not(source))] PathBuf),
    #[display("{_0} file(s) were rejected")]
    Rejected(#[error(not(source))] usize),
    #[display("operation failed")]
    Library,
}

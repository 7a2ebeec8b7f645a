use crate::jvm;

#[derive(Debug)]
pub enum Error {
    /// Class bytes could not be read, decoded, or encoded
    Jvm(jvm::Error),

    /// A class, method, or field name is not valid in the JVM
    MalformedName(String),

    /// A line of a catalog file could not be understood
    MalformedCatalog { line: usize, message: String },

    Io(std::io::Error),
}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::Jvm(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

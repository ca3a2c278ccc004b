use opencl3::error_codes::ClError;
use opencl3::types::cl_int;
use thiserror::Error;

use crate::runtime::Status;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Rejected on the host before any native call was issued.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("index out of range: {0}")]
    OutOfRange(String),

    #[error("{call} failed: errcode={code}")]
    Native { call: &'static str, code: cl_int },

    #[error("OpenCL runtime is not available ({status:?}): {message}")]
    Unavailable { status: Status, message: String },
}

impl Error {
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Native error code, if the error came back from the driver.
    pub fn code(&self) -> Option<cl_int> {
        match self {
            Error::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}

/// Tags a raw driver result with the entry point that produced it.
pub trait NativeResultExt<T> {
    fn native(self, call: &'static str) -> Result<T>;
}

impl<T> NativeResultExt<T> for std::result::Result<T, cl_int> {
    fn native(self, call: &'static str) -> Result<T> {
        self.map_err(|code| Error::Native { call, code })
    }
}

impl<T> NativeResultExt<T> for std::result::Result<T, ClError> {
    fn native(self, call: &'static str) -> Result<T> {
        self.map_err(|e| Error::Native { call, code: e.0 })
    }
}

#[test]
fn native_error_carries_code() {
    let r: std::result::Result<(), cl_int> = Err(-30);
    let err = r.native("clEnqueueReadBuffer").unwrap_err();
    assert_eq!(err.code(), Some(-30));
    assert_eq!(err.to_string(), "clEnqueueReadBuffer failed: errcode=-30");
}

#[test]
fn invalid_argument_has_no_code() {
    let err = Error::invalid("buffer is too small.");
    assert!(err.is_invalid_argument());
    assert_eq!(err.code(), None);
}

use std::path::PathBuf;

use thiserror::Error;

use crate::DataType;

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("Malformed parameter path \"{0}\".")]
    MalformedPath(String),
    #[error("Corrupt parameter data: {0}")]
    CorruptFormat(String),
    #[error("Unsupported data type tag {0}.")]
    UnsupportedType(i64),
    #[error("I/O error on \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Stream(#[from] std::io::Error),
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error(
        "Output buffer too small: {required} bytes required, {actual} bytes provided."
    )]
    BufferTooSmall {
        required: usize,
        actual: usize,
    },
    #[error(
        "Size mismatch: array of shape {shape:?} and data type \
        {data_type:?} expected to be {expected_size} bytes, got {actual_size} bytes."
    )]
    SizeMismatch {
        data_type: DataType,
        shape: Box<[usize]>,
        expected_size: usize,
        actual_size: usize,
    },
    #[error("Shape {0:?} overflows the addressable size.")]
    ShapeOverflow(Box<[usize]>),
    #[error("Invalid data type, expected {expected:?}, actual {actual:?}")]
    DataTypeMismatch {
        expected: DataType,
        actual: DataType,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ParameterError {
    pub(crate) fn io(
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        ParameterError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        ParameterError::CorruptFormat(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ParameterError>;

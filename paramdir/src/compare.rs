use std::fmt;

use crate::{DataType, ParameterDirectory};

/// One difference between two parameter directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterMismatch {
    Missing(String),
    Unexpected(String),
    DataTypeMismatch {
        path: String,
        expected: DataType,
        actual: DataType,
    },
    ShapeMismatch {
        path: String,
        expected: Box<[usize]>,
        actual: Box<[usize]>,
    },
    DataMismatch {
        path: String,
        byte_offset: usize,
    },
    NeedGradMismatch {
        path: String,
        expected: bool,
    },
}

impl ParameterMismatch {
    pub fn path(&self) -> &str {
        match self {
            ParameterMismatch::Missing(path)
            | ParameterMismatch::Unexpected(path)
            | ParameterMismatch::DataTypeMismatch {
                path,
                ..
            }
            | ParameterMismatch::ShapeMismatch {
                path,
                ..
            }
            | ParameterMismatch::DataMismatch {
                path,
                ..
            }
            | ParameterMismatch::NeedGradMismatch {
                path,
                ..
            } => path,
        }
    }
}

impl fmt::Display for ParameterMismatch {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ParameterMismatch::Missing(path) => write!(f, "{path}: missing"),
            ParameterMismatch::Unexpected(path) => write!(f, "{path}: unexpected"),
            ParameterMismatch::DataTypeMismatch {
                path,
                expected,
                actual,
            } => write!(f, "{path}: data type {actual}, expected {expected}"),
            ParameterMismatch::ShapeMismatch {
                path,
                expected,
                actual,
            } => write!(f, "{path}: shape {actual:?}, expected {expected:?}"),
            ParameterMismatch::DataMismatch {
                path,
                byte_offset,
            } => write!(f, "{path}: data differs at byte {byte_offset}"),
            ParameterMismatch::NeedGradMismatch {
                path,
                expected,
            } => write!(f, "{path}: need_grad {}, expected {expected}", !expected),
        }
    }
}

/// Byte-exact comparison of `actual` against `expected`, in `expected` order.
pub fn compare_parameters(
    expected: &ParameterDirectory,
    actual: &ParameterDirectory,
) -> Vec<ParameterMismatch> {
    let mut mismatches = Vec::new();
    for (path, expected_variable) in expected.get_parameters() {
        let Some(actual_variable) = actual.get_parameter(&path) else {
            mismatches.push(ParameterMismatch::Missing(path));
            continue;
        };
        let expected_variable = expected_variable.borrow();
        let actual_variable = actual_variable.borrow();
        let (expected_data, actual_data) = (expected_variable.data(), actual_variable.data());

        if expected_data.data_type() != actual_data.data_type() {
            mismatches.push(ParameterMismatch::DataTypeMismatch {
                path,
                expected: expected_data.data_type(),
                actual: actual_data.data_type(),
            });
        } else if expected_data.shape() != actual_data.shape() {
            mismatches.push(ParameterMismatch::ShapeMismatch {
                path,
                expected: expected_data.shape().into(),
                actual: actual_data.shape().into(),
            });
        } else if let Some(byte_offset) = expected_data
            .as_bytes()
            .iter()
            .zip(actual_data.as_bytes())
            .position(|(a, b)| a != b)
        {
            mismatches.push(ParameterMismatch::DataMismatch {
                path,
                byte_offset,
            });
        } else if expected_variable.need_grad() != actual_variable.need_grad() {
            mismatches.push(ParameterMismatch::NeedGradMismatch {
                path,
                expected: expected_variable.need_grad(),
            });
        }
    }
    for (path, _) in actual.get_parameters() {
        if !expected.contains(&path) {
            mismatches.push(ParameterMismatch::Unexpected(path));
        }
    }
    mismatches
}

pub fn parameters_equal(
    expected: &ParameterDirectory,
    actual: &ParameterDirectory,
) -> bool {
    compare_parameters(expected, actual).is_empty()
}

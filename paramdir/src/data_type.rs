use bytemuck::Pod;
use half::f16;
use serde::{Deserialize, Serialize};

use crate::{ExtendedFloat, ParameterError};

/// Element type of a persisted buffer.
///
/// The numeric tags follow the NumPy type numbers used by the legacy
/// parameter files and must never be reassigned.
#[derive(
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Copy,
    Clone,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    // Integers
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    // Floating point
    F16,
    F32,
    F64,
    F80,
}

impl DataType {
    pub const ALL: [DataType; 13] = [
        DataType::Bool,
        DataType::I8,
        DataType::U8,
        DataType::I16,
        DataType::U16,
        DataType::I32,
        DataType::U32,
        DataType::I64,
        DataType::U64,
        DataType::F16,
        DataType::F32,
        DataType::F64,
        DataType::F80,
    ];

    pub const fn size_in_bytes(&self) -> usize {
        match self {
            DataType::Bool | DataType::I8 | DataType::U8 => 1,
            DataType::I16 | DataType::U16 | DataType::F16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::I64 | DataType::U64 | DataType::F64 => 8,
            // x87 extended precision occupies a 16-byte slot.
            DataType::F80 => 16,
        }
    }

    pub const fn size_in_bits(&self) -> usize {
        self.size_in_bytes() * 8
    }

    pub const fn tag(&self) -> i64 {
        match self {
            DataType::Bool => 0,
            DataType::I8 => 1,
            DataType::U8 => 2,
            DataType::I16 => 3,
            DataType::U16 => 4,
            DataType::I32 => 5,
            DataType::U32 => 6,
            DataType::I64 => 7,
            DataType::U64 => 8,
            DataType::F32 => 11,
            DataType::F64 => 12,
            DataType::F80 => 13,
            DataType::F16 => 23,
        }
    }

    pub fn from_tag(tag: i64) -> Result<Self, ParameterError> {
        let data_type = match tag {
            0 => DataType::Bool,
            1 => DataType::I8,
            2 => DataType::U8,
            3 => DataType::I16,
            4 => DataType::U16,
            5 => DataType::I32,
            6 => DataType::U32,
            7 | 9 => DataType::I64,
            8 | 10 => DataType::U64,
            11 => DataType::F32,
            12 => DataType::F64,
            13 => DataType::F80,
            23 => DataType::F16,
            _ => return Err(ParameterError::UnsupportedType(tag)),
        };
        Ok(data_type)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::I8 => "int8",
            DataType::U8 => "uint8",
            DataType::I16 => "int16",
            DataType::U16 => "uint16",
            DataType::I32 => "int32",
            DataType::U32 => "uint32",
            DataType::I64 => "int64",
            DataType::U64 => "uint64",
            DataType::F16 => "float16",
            DataType::F32 => "float32",
            DataType::F64 => "float64",
            DataType::F80 => "float80",
        }
    }

    pub const fn is_float(&self) -> bool {
        matches!(
            self,
            DataType::F16 | DataType::F32 | DataType::F64 | DataType::F80
        )
    }
}

impl std::fmt::Display for DataType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Plain-old-data element types that can back a [`crate::TypedBuffer`].
///
/// `bool` is not `Pod` and goes through `TypedBuffer::from_bools` instead.
pub trait ArrayElement: Pod {
    fn data_type() -> DataType;
}

macro_rules! impl_array_element {
    ($($type:ty => $variant:ident),+ $(,)?) => {
        $(
            impl ArrayElement for $type {
                fn data_type() -> DataType {
                    DataType::$variant
                }
            }
        )+
    };
}

impl_array_element! {
    f16 => F16,
    f32 => F32,
    f64 => F64,
    ExtendedFloat => F80,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
}

#![allow(dead_code)]

use half::f16;
use paramdir::{ExtendedFloat, ParameterDirectory, TypedBuffer, Variable};

/// Deterministic pseudo-random weights in [-1, 1).
pub fn weights(
    count: usize,
    seed: u32,
) -> Vec<f32> {
    let mut state = seed.wrapping_mul(747796405).wrapping_add(2891336453);
    (0..count)
        .map(|_| {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            (state >> 8) as f32 / (1u32 << 23) as f32 - 1.0
        })
        .collect()
}

/// Two conv layers followed by two affine layers.
pub fn model_parameters() -> ParameterDirectory {
    let layers: [(&str, &[usize], &[usize]); 4] = [
        ("conv1", &[16, 1, 3, 3], &[16]),
        ("conv2", &[16, 16, 3, 3], &[16]),
        ("affine3", &[400, 50], &[50]),
        ("affine4", &[50, 10], &[10]),
    ];
    let directory = ParameterDirectory::new();
    for (seed, (name, weight_shape, bias_shape)) in layers.into_iter().enumerate() {
        let layer = directory.scope(name).unwrap();
        let count: usize = weight_shape.iter().product();
        layer
            .get_or_create(
                "W",
                TypedBuffer::from_slice(weight_shape, &weights(count, seed as u32))
                    .unwrap()
                    .into(),
            )
            .unwrap();
        layer
            .get_or_create(
                "b",
                TypedBuffer::zeros(bias_shape, paramdir::DataType::F32).unwrap().into(),
            )
            .unwrap();
    }
    directory
}

/// One scalar parameter per supported element type.
pub fn scalar_parameters() -> ParameterDirectory {
    let directory = ParameterDirectory::new();
    let values = [
        ("bool", TypedBuffer::from_bools(&[1], &[true]).unwrap()),
        ("char", TypedBuffer::scalar(-3i8)),
        ("uint8", TypedBuffer::scalar(200u8)),
        ("short", TypedBuffer::scalar(-1234i16)),
        ("ushort", TypedBuffer::scalar(54321u16)),
        ("int", TypedBuffer::scalar(-123456i32)),
        ("uint32", TypedBuffer::scalar(4000000000u32)),
        ("longlong", TypedBuffer::scalar(-(1i64 << 40))),
        ("ulonglong", TypedBuffer::scalar(u64::MAX - 1)),
        ("half", TypedBuffer::scalar(f16::from_f32(0.333))),
        ("float", TypedBuffer::scalar(1.5f32)),
        ("double", TypedBuffer::scalar(-2.25f64)),
        ("long_double", TypedBuffer::scalar(ExtendedFloat::from_f64(1e300))),
    ];
    for (name, buffer) in values {
        directory
            .get_or_create(&format!("dtypes/{name}"), Variable::new(buffer, false))
            .unwrap();
    }
    directory
}

//! Flat record format: a protobuf message with one `Parameter` per entry.
//!
//! The schema lives in `src/protos/parameter.proto`. Payloads are stored as
//! little-endian `raw_data` tagged with `dtype`; records that only carry the
//! float `data` field decode as float32.

use std::io::Write;

use protobuf::{Message, MessageField};

use super::{DecodedParameter, ParameterCodec};
use crate::{
    DataType, ParameterDirectory, ParameterError, TypedBuffer, Variable,
    directory::validate_path,
    protos::{Parameter, ParameterProto, Shape},
    typed_buffer::{num_elements_for_shape, size_for_shape},
};

pub const PROTO_VERSION: &str = "1";

#[derive(Debug, Clone)]
pub struct ProtoCodec {
    max_payload_bytes: u64,
}

impl Default for ProtoCodec {
    fn default() -> Self {
        Self {
            max_payload_bytes: u64::MAX,
        }
    }
}

fn to_record(
    name: &str,
    variable: &Variable,
) -> Parameter {
    let data = variable.data();
    let shape = Shape {
        dim: data.shape().iter().map(|&dim| dim as i64).collect(),
        ..Default::default()
    };
    Parameter {
        variable_name: name.to_string(),
        shape: MessageField::some(shape),
        need_grad: variable.need_grad(),
        dtype: Some(data.data_type().tag() as i32),
        raw_data: Some(data.as_bytes().to_vec()),
        ..Default::default()
    }
}

fn to_message(directory: &ParameterDirectory) -> ParameterProto {
    ParameterProto {
        version: PROTO_VERSION.to_string(),
        parameter: directory
            .get_parameters()
            .into_iter()
            .map(|(name, variable)| to_record(&name, &variable.borrow()))
            .collect(),
        ..Default::default()
    }
}

fn read_shape(
    name: &str,
    record: &Parameter,
) -> Result<Vec<usize>, ParameterError> {
    let Some(shape) = record.shape.as_ref() else {
        return Ok(Vec::new());
    };
    shape
        .dim
        .iter()
        .map(|&dim| {
            usize::try_from(dim).map_err(|_| {
                ParameterError::corrupt(format!("\"{name}\": invalid dimension {dim}"))
            })
        })
        .collect()
}

impl ProtoCodec {
    pub fn new(max_payload_bytes: u64) -> Self {
        Self {
            max_payload_bytes,
        }
    }

    fn check_payload_limit(
        &self,
        name: &str,
        size: usize,
    ) -> Result<(), ParameterError> {
        if size as u64 > self.max_payload_bytes {
            return Err(ParameterError::corrupt(format!(
                "\"{name}\": payload of {size} bytes exceeds the limit of {} bytes",
                self.max_payload_bytes
            )));
        }
        Ok(())
    }

    fn build_parameter(
        &self,
        record: Parameter,
    ) -> Result<DecodedParameter, ParameterError> {
        let name = record.variable_name.clone();
        if name.is_empty() {
            return Err(ParameterError::corrupt("parameter without a name"));
        }
        validate_path(&name).map_err(|_| {
            ParameterError::corrupt(format!("invalid parameter name \"{name}\""))
        })?;
        let shape = read_shape(&name, &record)?;

        let buffer = match record.dtype {
            Some(tag) => {
                let data_type = DataType::from_tag(tag as i64)?;
                let payload = record.raw_data.unwrap_or_default();
                let expected = size_for_shape(&shape, data_type).ok_or_else(|| {
                    ParameterError::corrupt(format!("\"{name}\": shape {shape:?} overflows"))
                })?;
                self.check_payload_limit(&name, expected)?;
                if payload.len() != expected {
                    return Err(ParameterError::corrupt(format!(
                        "\"{name}\": {data_type} {shape:?} needs {expected} bytes, record holds {}",
                        payload.len()
                    )));
                }
                TypedBuffer::from_bytes(&shape, data_type, payload)?
            },
            None if record.raw_data.is_some() => {
                return Err(ParameterError::corrupt(format!(
                    "\"{name}\": raw data without a dtype"
                )));
            },
            None => {
                log::warn!("\"{name}\": legacy float-only record, decoding as float32");
                let expected = num_elements_for_shape(&shape).ok_or_else(|| {
                    ParameterError::corrupt(format!("\"{name}\": shape {shape:?} overflows"))
                })?;
                if record.data.len() != expected {
                    return Err(ParameterError::corrupt(format!(
                        "\"{name}\": shape {shape:?} needs {expected} floats, record holds {}",
                        record.data.len()
                    )));
                }
                TypedBuffer::from_slice(&shape, &record.data)?
            },
        };
        Ok((name, Variable::new(buffer, record.need_grad)))
    }
}

impl ParameterCodec for ProtoCodec {
    fn name(&self) -> &'static str {
        "protobuf"
    }

    fn encoded_size(
        &self,
        directory: &ParameterDirectory,
    ) -> Result<usize, ParameterError> {
        Ok(to_message(directory).compute_size() as usize)
    }

    fn encode_to_writer(
        &self,
        directory: &ParameterDirectory,
        out: &mut dyn Write,
    ) -> Result<(), ParameterError> {
        let message = to_message(directory);
        log::debug!(
            "Encoding {} parameters as a {} byte protobuf message",
            message.parameter.len(),
            message.compute_size()
        );
        message
            .write_to_writer(out)
            .map_err(|error| ParameterError::Stream(std::io::Error::other(error)))
    }

    fn decode_entries(
        &self,
        bytes: &[u8],
    ) -> Result<Vec<DecodedParameter>, ParameterError> {
        let message = ParameterProto::parse_from_bytes(bytes)
            .map_err(|error| ParameterError::corrupt(error.to_string()))?;
        log::debug!("Protobuf parameter file version \"{}\"", message.version);
        message
            .parameter
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                self.build_parameter(record).map_err(|error| match error {
                    ParameterError::CorruptFormat(message) => {
                        ParameterError::corrupt(format!("record {index}: {message}"))
                    },
                    other => other,
                })
            })
            .collect()
    }
}

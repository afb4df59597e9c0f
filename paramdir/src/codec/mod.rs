mod container;
mod proto;

use std::io::Write;

pub use container::{CONTAINER_MAGIC, CONTAINER_VERSION, ContainerCodec};
pub use proto::{PROTO_VERSION, ProtoCodec};

use crate::{ParameterDirectory, ParameterError, Variable};

/// A fully validated entry produced by a decoder, ready to be committed.
pub type DecodedParameter = (String, Variable);

/// Symmetric encode/decode between a [`ParameterDirectory`] and bytes.
pub trait ParameterCodec {
    fn name(&self) -> &'static str;

    /// Exact number of bytes `encode_to_writer` will produce.
    fn encoded_size(
        &self,
        directory: &ParameterDirectory,
    ) -> Result<usize, ParameterError>;

    fn encode_to_writer(
        &self,
        directory: &ParameterDirectory,
        out: &mut dyn Write,
    ) -> Result<(), ParameterError>;

    /// Parses and validates the whole input without touching any directory.
    fn decode_entries(
        &self,
        bytes: &[u8],
    ) -> Result<Vec<DecodedParameter>, ParameterError>;

    fn encode(
        &self,
        directory: &ParameterDirectory,
    ) -> Result<Vec<u8>, ParameterError> {
        let mut out = Vec::with_capacity(self.encoded_size(directory)?);
        self.encode_to_writer(directory, &mut out)?;
        Ok(out)
    }

    /// Measure-then-fill entry point.
    ///
    /// With `None` only the required size is computed. With a buffer, the
    /// encoding is written to its front and the number of bytes written is
    /// returned; a buffer shorter than the required size is left untouched.
    fn encode_to_buffer(
        &self,
        directory: &ParameterDirectory,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, ParameterError> {
        let required = self.encoded_size(directory)?;
        let Some(buffer) = buffer else {
            return Ok(required);
        };
        if buffer.len() < required {
            return Err(ParameterError::BufferTooSmall {
                required,
                actual: buffer.len(),
            });
        }
        let mut cursor = &mut buffer[..required];
        self.encode_to_writer(directory, &mut cursor)?;
        if !cursor.is_empty() {
            return Err(ParameterError::corrupt(format!(
                "{} encoder wrote {} bytes, measured {required}",
                self.name(),
                required - cursor.len()
            )));
        }
        Ok(required)
    }

    /// Decodes `bytes` into `directory`.
    ///
    /// Nothing is committed unless the whole input decodes, so a failure
    /// leaves `directory` untouched.
    fn decode_into(
        &self,
        bytes: &[u8],
        directory: &ParameterDirectory,
    ) -> Result<(), ParameterError> {
        let entries = self.decode_entries(bytes)?;
        log::debug!(
            "{} decoder produced {} parameters",
            self.name(),
            entries.len()
        );
        for (path, variable) in entries {
            directory.set_parameter(&path, variable)?;
        }
        Ok(())
    }

    fn decode(
        &self,
        bytes: &[u8],
    ) -> Result<ParameterDirectory, ParameterError> {
        let directory = ParameterDirectory::new();
        self.decode_into(bytes, &directory)?;
        Ok(directory)
    }
}

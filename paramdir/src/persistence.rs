use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    ParameterDirectory, ParameterError, archive,
    codec::{ContainerCodec, ParameterCodec, ProtoCodec},
    config::PersistenceConfig,
};

/// On-disk encoding of a parameter file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Proto,
    Container,
}

impl Format {
    pub fn from_path(
        path: &Path,
        config: &PersistenceConfig,
    ) -> Self {
        if config.is_container_path(path) {
            Format::Container
        } else {
            Format::Proto
        }
    }

    /// File name suffix this format is written with by default.
    pub fn default_extension(&self) -> &'static str {
        match self {
            Format::Proto => ".protobuf",
            Format::Container => ".h5",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Format::Proto => write!(f, "proto"),
            Format::Container => write!(f, "container"),
        }
    }
}

/// Saves and loads parameter directories, choosing a codec per file.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    config: PersistenceConfig,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(PersistenceConfig::from_env())
    }
}

impl ParameterStore {
    pub fn new(config: PersistenceConfig) -> Self {
        Self {
            config,
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn format_for(
        &self,
        path: &Path,
    ) -> Format {
        Format::from_path(path, &self.config)
    }

    pub fn codec(
        &self,
        format: Format,
    ) -> Box<dyn ParameterCodec> {
        match format {
            Format::Proto => Box::new(ProtoCodec::new(self.config.max_payload_bytes)),
            Format::Container => {
                Box::new(ContainerCodec::new(self.config.max_payload_bytes))
            },
        }
    }

    // Files

    /// Saves by extension: archive suffixes produce a `.nnp` bundle, the rest
    /// a single parameter file.
    pub fn save(
        &self,
        directory: &ParameterDirectory,
        path: &Path,
    ) -> Result<(), ParameterError> {
        if self.config.is_archive_path(path) {
            archive::write_archive(self, directory, path)?;
            log::info!(
                "Saved {} parameters to archive {}",
                directory.len(),
                path.display()
            );
            return Ok(());
        }
        self.save_as(directory, path, self.format_for(path))
    }

    pub fn save_as(
        &self,
        directory: &ParameterDirectory,
        path: &Path,
        format: Format,
    ) -> Result<(), ParameterError> {
        let file = File::create(path).map_err(|err| ParameterError::io(path, err))?;
        let mut writer = BufWriter::new(file);
        self.codec(format).encode_to_writer(directory, &mut writer)?;
        writer.flush().map_err(|err| ParameterError::io(path, err))?;
        log::info!(
            "Saved {} parameters to {} ({format})",
            directory.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load_into(
        &self,
        directory: &ParameterDirectory,
        path: &Path,
    ) -> Result<(), ParameterError> {
        if !self.config.is_archive_path(path) {
            return self.load_as_into(directory, path, self.format_for(path));
        }
        let staging = archive::read_archive(self, path)?;
        for (name, variable) in staging.get_parameters() {
            let variable = variable.borrow().clone();
            directory.set_parameter(&name, variable)?;
        }
        log::info!(
            "Loaded {} parameters from archive {}",
            staging.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load_as_into(
        &self,
        directory: &ParameterDirectory,
        path: &Path,
        format: Format,
    ) -> Result<(), ParameterError> {
        let bytes = std::fs::read(path).map_err(|err| ParameterError::io(path, err))?;
        self.codec(format).decode_into(&bytes, directory)?;
        log::info!("Loaded parameters from {} ({format})", path.display());
        Ok(())
    }

    pub fn load(
        &self,
        path: &Path,
    ) -> Result<ParameterDirectory, ParameterError> {
        let directory = ParameterDirectory::new();
        self.load_into(&directory, path)?;
        Ok(directory)
    }

    // Buffers

    /// With `None`, returns the size a buffer must have; otherwise fills it.
    pub fn save_to_buffer(
        &self,
        directory: &ParameterDirectory,
        format: Format,
        buffer: Option<&mut [u8]>,
    ) -> Result<usize, ParameterError> {
        self.codec(format).encode_to_buffer(directory, buffer)
    }

    pub fn encode(
        &self,
        directory: &ParameterDirectory,
        format: Format,
    ) -> Result<Vec<u8>, ParameterError> {
        self.codec(format).encode(directory)
    }

    pub fn load_from_buffer(
        &self,
        directory: &ParameterDirectory,
        format: Format,
        bytes: &[u8],
    ) -> Result<(), ParameterError> {
        self.codec(format).decode_into(bytes, directory)
    }
}

pub fn save_parameters(
    directory: &ParameterDirectory,
    path: impl AsRef<Path>,
) -> Result<(), ParameterError> {
    ParameterStore::default().save(directory, path.as_ref())
}

pub fn load_parameters(path: impl AsRef<Path>) -> Result<ParameterDirectory, ParameterError> {
    ParameterStore::default().load(path.as_ref())
}

pub fn load_parameters_into(
    directory: &ParameterDirectory,
    path: impl AsRef<Path>,
) -> Result<(), ParameterError> {
    ParameterStore::default().load_into(directory, path.as_ref())
}

pub fn save_parameters_pb(
    directory: &ParameterDirectory,
    buffer: Option<&mut [u8]>,
) -> Result<usize, ParameterError> {
    ParameterStore::default().save_to_buffer(directory, Format::Proto, buffer)
}

pub fn save_parameters_h5(
    directory: &ParameterDirectory,
    buffer: Option<&mut [u8]>,
) -> Result<usize, ParameterError> {
    ParameterStore::default().save_to_buffer(directory, Format::Container, buffer)
}

pub fn load_parameters_pb(
    directory: &ParameterDirectory,
    bytes: &[u8],
) -> Result<(), ParameterError> {
    ParameterStore::default().load_from_buffer(directory, Format::Proto, bytes)
}

pub fn load_parameters_h5(
    directory: &ParameterDirectory,
    bytes: &[u8],
) -> Result<(), ParameterError> {
    ParameterStore::default().load_from_buffer(directory, Format::Container, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TypedBuffer, Variable};

    fn directory() -> ParameterDirectory {
        let directory = ParameterDirectory::new();
        directory
            .get_or_create(
                "affine/W",
                TypedBuffer::from_slice(&[2, 3], &[1i32, 2, 3, 4, 5, 6]).unwrap().into(),
            )
            .unwrap();
        directory
            .get_or_create("affine/b", Variable::new(TypedBuffer::scalar(0.5f64), false))
            .unwrap();
        directory
    }

    #[test]
    fn test_format_dispatch() {
        let store = ParameterStore::new(PersistenceConfig::default());
        assert_eq!(store.format_for(Path::new("a.h5")), Format::Container);
        assert_eq!(store.format_for(Path::new("a.protobuf")), Format::Proto);
        assert_eq!(store.format_for(Path::new("a")), Format::Proto);

        let store = ParameterStore::new(PersistenceConfig {
            container_extensions: vec![".hdf5".to_string()],
            ..PersistenceConfig::default()
        });
        assert_eq!(store.format_for(Path::new("a.h5")), Format::Proto);
        assert_eq!(store.format_for(Path::new("a.hdf5")), Format::Container);
    }

    #[test]
    fn test_file_round_trip_both_formats() {
        let store = ParameterStore::new(PersistenceConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let source = directory();
        for name in ["params.h5", "params.protobuf"] {
            let path = dir.path().join(name);
            store.save(&source, &path).unwrap();
            let loaded = store.load(&path).unwrap();
            assert_eq!(loaded.len(), 2);
            for (name, variable) in source.get_parameters() {
                assert_eq!(
                    *loaded.get_parameter(&name).unwrap().borrow(),
                    *variable.borrow()
                );
            }
        }
    }

    #[test]
    fn test_explicit_format_ignores_extension() {
        let store = ParameterStore::new(PersistenceConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.bin");
        store.save_as(&directory(), &path, Format::Container).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], &crate::codec::CONTAINER_MAGIC);

        let loaded = ParameterDirectory::new();
        store.load_as_into(&loaded, &path, Format::Container).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_buffer_too_small() {
        let store = ParameterStore::new(PersistenceConfig::default());
        let source = directory();
        let size = store.save_to_buffer(&source, Format::Proto, None).unwrap();
        let mut buffer = vec![0xAAu8; size - 1];
        assert!(matches!(
            store.save_to_buffer(&source, Format::Proto, Some(&mut buffer)),
            Err(ParameterError::BufferTooSmall { required, actual })
                if required == size && actual == size - 1
        ));
        assert!(buffer.iter().all(|&byte| byte == 0xAA));
    }

    #[test]
    fn test_payload_limit_from_config() {
        let source = directory();
        let bytes = ParameterStore::new(PersistenceConfig::default())
            .encode(&source, Format::Container)
            .unwrap();
        let strict = ParameterStore::new(PersistenceConfig {
            max_payload_bytes: 8,
            ..PersistenceConfig::default()
        });
        let target = ParameterDirectory::new();
        assert!(matches!(
            strict.load_from_buffer(&target, Format::Container, &bytes),
            Err(ParameterError::CorruptFormat(_))
        ));
        assert!(target.is_empty());
    }

    #[test]
    fn test_archive_extension_writes_bundle() {
        let store = ParameterStore::new(PersistenceConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.nnp");
        store.save(&directory(), &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"PK\x03\x04");
        let loaded = store.load(&path).unwrap();
        assert!(crate::parameters_equal(&directory(), &loaded));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.protobuf");
        assert!(matches!(
            load_parameters(&path),
            Err(ParameterError::Io { path: p, .. }) if p == path
        ));
    }
}

//! `.nnp` bundles: zip archives holding a version marker and parameter files.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::{
    ParameterDirectory, ParameterError, VariableRef,
    persistence::{Format, ParameterStore},
};

pub const ARCHIVE_VERSION_ENTRY: &str = "nnp_version.txt";
pub const ARCHIVE_VERSION: &str = "0.1";
pub const ARCHIVE_PARAMETER_ENTRY: &str = "parameter.h5";

fn entry_format(
    store: &ParameterStore,
    name: &str,
) -> Option<Format> {
    if store.config().is_container_path(Path::new(name)) {
        Some(Format::Container)
    } else if name.to_ascii_lowercase().ends_with(Format::Proto.default_extension()) {
        Some(Format::Proto)
    } else {
        None
    }
}

/// Decodes every parameter entry of the archive at `path` into a fresh
/// directory. Entries that are not parameter files are skipped.
pub(crate) fn read_archive(
    store: &ParameterStore,
    path: &Path,
) -> Result<ParameterDirectory, ParameterError> {
    let file = File::open(path).map_err(|err| ParameterError::io(path, err))?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    let limit = store.config().max_payload_bytes;

    let staging = ParameterDirectory::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let Some(format) = entry_format(store, &name) else {
            log::debug!("Skipping archive entry \"{name}\"");
            continue;
        };
        if entry.size() > limit {
            return Err(ParameterError::corrupt(format!(
                "archive entry \"{name}\" declares {} bytes, exceeding the limit of {limit} bytes",
                entry.size()
            )));
        }
        let mut bytes = Vec::new();
        entry
            .by_ref()
            .take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|err| ParameterError::io(path.join(&name), err))?;
        if bytes.len() as u64 > limit {
            return Err(ParameterError::corrupt(format!(
                "archive entry \"{name}\" exceeds the limit of {limit} bytes"
            )));
        }
        store.load_from_buffer(&staging, format, &bytes)?;
        log::debug!("Read \"{name}\" from {} ({format})", path.display());
    }
    Ok(staging)
}

/// Writes `nnp_version.txt` and the container encoding of `directory`.
pub(crate) fn write_archive(
    store: &ParameterStore,
    directory: &ParameterDirectory,
    path: &Path,
) -> Result<(), ParameterError> {
    let parameters = store.encode(directory, Format::Container)?;
    let file = File::create(path).map_err(|err| ParameterError::io(path, err))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default();

    writer.start_file(ARCHIVE_VERSION_ENTRY, options)?;
    writer.write_all(ARCHIVE_VERSION.as_bytes())?;
    writer.start_file(ARCHIVE_PARAMETER_ENTRY, options)?;
    writer.write_all(&parameters)?;

    let mut file = writer.finish()?;
    file.flush().map_err(|err| ParameterError::io(path, err))?;
    Ok(())
}

/// Accumulates parameters from parameter files and `.nnp` archives.
///
/// Files are merged in the order they are added; a later file overrides
/// earlier values for the same path.
#[derive(Debug, Default)]
pub struct ParameterArchive {
    store: ParameterStore,
    directory: ParameterDirectory,
}

impl ParameterArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: ParameterStore) -> Self {
        Self {
            store,
            directory: ParameterDirectory::new(),
        }
    }

    pub fn directory(&self) -> &ParameterDirectory {
        &self.directory
    }

    pub fn get_parameters(&self) -> Vec<(String, VariableRef)> {
        self.directory.get_parameters()
    }

    pub fn add(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(), ParameterError> {
        self.store.load_into(&self.directory, path.as_ref())
    }

    /// Writes every accumulated parameter, choosing the layout by extension.
    pub fn save_parameters(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(), ParameterError> {
        self.store.save(&self.directory, path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TypedBuffer, config::PersistenceConfig};

    fn archive() -> ParameterArchive {
        ParameterArchive::with_store(ParameterStore::new(PersistenceConfig::default()))
    }

    #[test]
    fn test_nnp_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.nnp");
        let archive = archive();
        archive
            .directory()
            .get_or_create("fc/W", TypedBuffer::scalar(3u32).into())
            .unwrap();
        archive.save_parameters(&path).unwrap();

        let mut zip = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut version = String::new();
        zip.by_name(ARCHIVE_VERSION_ENTRY)
            .unwrap()
            .read_to_string(&mut version)
            .unwrap();
        assert_eq!(version, ARCHIVE_VERSION);
        assert!(zip.by_name(ARCHIVE_PARAMETER_ENTRY).is_ok());
    }

    #[test]
    fn test_archive_with_proto_entry_and_extras() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.nnp");
        let source = ParameterDirectory::new();
        source
            .get_or_create("w", TypedBuffer::from_slice(&[2], &[1i8, -1]).unwrap().into())
            .unwrap();
        let proto = ParameterStore::new(PersistenceConfig::default())
            .encode(&source, Format::Proto)
            .unwrap();

        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        let options = SimpleFileOptions::default();
        writer.start_file("network.nntxt", options).unwrap();
        writer.write_all(b"network {}").unwrap();
        writer.start_file("parameter.protobuf", options).unwrap();
        writer.write_all(&proto).unwrap();
        writer.finish().unwrap();

        let mut archive = archive();
        archive.add(&path).unwrap();
        let parameters = archive.get_parameters();
        assert_eq!(parameters.len(), 1);
        assert_eq!(
            parameters[0].1.borrow().data().to_vec::<i8>().unwrap(),
            vec![1, -1]
        );
    }

    #[test]
    fn test_corrupt_archive_entry_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.nnp");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file("parameter.h5", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"not a container").unwrap();
        writer.finish().unwrap();

        let mut archive = archive();
        assert!(matches!(archive.add(&path), Err(ParameterError::CorruptFormat(_))));
        assert!(archive.directory().is_empty());
    }

    fn write_stored_entry(
        path: &Path,
        name: &str,
        bytes: &[u8],
    ) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file(name, options).unwrap();
        writer.write_all(bytes).unwrap();
        writer.finish().unwrap();
    }

    fn limited_archive(max_payload_bytes: u64) -> ParameterArchive {
        ParameterArchive::with_store(ParameterStore::new(PersistenceConfig {
            max_payload_bytes,
            ..PersistenceConfig::default()
        }))
    }

    #[test]
    fn test_declared_entry_size_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inflated.nnp");
        write_stored_entry(&path, "parameter.h5", b"tiny");

        // Rewrite the uncompressed size in the central directory record.
        let mut bytes = std::fs::read(&path).unwrap();
        let central = bytes
            .windows(4)
            .position(|window| window == b"PK\x01\x02")
            .unwrap();
        bytes[central + 24..central + 28].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let mut archive = limited_archive(1 << 20);
        assert!(matches!(
            archive.add(&path),
            Err(ParameterError::CorruptFormat(message)) if message.contains("declares")
        ));
        assert!(archive.directory().is_empty());
    }

    #[test]
    fn test_entry_content_over_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.nnp");
        write_stored_entry(&path, "parameter.protobuf", &[0u8; 64]);

        let mut archive = limited_archive(16);
        assert!(matches!(archive.add(&path), Err(ParameterError::CorruptFormat(_))));
        assert!(archive.directory().is_empty());
    }

    #[test]
    fn test_not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.nnp");
        std::fs::write(&path, b"plain text").unwrap();
        assert!(matches!(archive().add(&path), Err(ParameterError::Archive(_))));
    }
}

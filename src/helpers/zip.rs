//! ZIP archive helper utilities for OpenDocument (.ods) packages.
//! Provides entry lookup and re-packing with a single replaced entry.

use crate::error::RosterSyncError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

/// Helper trait for ZIP archive operations
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets a file from the ZIP archive by name (case-insensitive, path separator agnostic)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RosterSyncError>;

    /// Creates an XML reader for a file within the ZIP archive
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RosterSyncError>;

    /// Reads a whole entry into memory
    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, RosterSyncError>;

    /// Writes a copy of the archive in which the entry `name` holds `content`.
    /// Every other entry is copied raw, keeping its order, compression and metadata.
    fn repack(&mut self, name: &str, content: &[u8]) -> Result<Vec<u8>, RosterSyncError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    /// Gets a file from the ZIP archive by name with case-insensitive matching
    /// and path separator normalization (backslash to forward slash)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RosterSyncError> {
        let pattern = name.replace('\\', "/");
        let path = self.file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RosterSyncError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }

    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, RosterSyncError> {
        match self.file(name)? {
            Some(mut file) => {
                let mut buffer = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut buffer)?;
                Ok(Some(buffer))
            }
            None => Ok(None),
        }
    }

    fn repack(&mut self, name: &str, content: &[u8]) -> Result<Vec<u8>, RosterSyncError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for index in 0..self.len() {
            let entry = self.by_index_raw(index)?;
            if entry.name().eq_ignore_ascii_case(name) {
                let entry_name = entry.name().to_owned();
                drop(entry);
                let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                writer.start_file(entry_name, options)?;
                writer.write_all(content)?;
            } else {
                writer.raw_copy_file(entry)?;
            }
        }
        Ok(writer.finish()?.into_inner())
    }
}

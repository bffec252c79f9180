//! OPC package: the zip container behind an XLSX file
//!
//! Parts are held as raw bytes in their original order so a package can be
//! written back with every part it did not touch left byte-for-byte intact.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;

use crate::error::{XlsxError, XlsxResult};

/// In-memory copy of an XLSX zip container
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Empty package
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a package from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Read a package from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.push((name, data));
        }

        let package = Self { parts };
        if !package.contains("[Content_Types].xml") {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }
        Ok(package)
    }

    /// Write the package to a writer
    pub fn write<W: Write + Seek>(&self, writer: W) -> XlsxResult<()> {
        let mut zip = zip::ZipWriter::new(writer);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, data) in &self.parts {
            zip.start_file(name.clone(), options)?;
            zip.write_all(data)?;
        }

        zip.finish()?;
        Ok(())
    }

    /// Write the package to a file path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> XlsxResult<()> {
        // Whole package in memory before the target is opened.
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Serialize the package into a byte buffer
    pub fn to_bytes(&self) -> XlsxResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Whether a part exists
    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    /// Raw bytes of a part
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// Part decoded as UTF-8 text
    pub fn get_text(&self, name: &str) -> XlsxResult<String> {
        let data = self
            .get(name)
            .ok_or_else(|| XlsxError::MissingPart(name.to_string()))?;
        let text = std::str::from_utf8(data)
            .map_err(|e| XlsxError::Parse(format!("{} is not UTF-8: {}", name, e)))?;
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }

    /// Replace a part, or append it if it does not exist
    pub fn set(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.parts.push((name.to_string(), data)),
        }
    }

    /// Remove a part, returning whether it existed
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.parts.len();
        self.parts.retain(|(n, _)| n != name);
        self.parts.len() != before
    }

    /// Part names in package order
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }
}

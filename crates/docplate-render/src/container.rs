//! In-memory zip container.

use crate::RenderError;
use docplate_stream::{read_chunks, StreamError};
use futures::stream::Stream;
use std::io::{Cursor, Read, Seek, Write};

/// Every entry of a zip archive, held in memory in archive order.
#[derive(Debug, Clone, Default)]
pub struct Container {
    parts: Vec<(String, Vec<u8>)>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RenderError> {
        Self::from_reader(Cursor::new(bytes))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, RenderError> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.push((name, data));
        }

        tracing::debug!(parts = parts.len(), "Container::from_reader: loaded archive");
        Ok(Self { parts })
    }

    /// Write the container back out as a deflated zip archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RenderError> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

        for (name, data) in &self.parts {
            let options: zip::write::FileOptions<'_, ()> = zip::write::FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);
            if name.ends_with('/') {
                zip.add_directory(name.as_str(), options)?;
            } else {
                zip.start_file(name.as_str(), options)?;
                zip.write_all(data)?;
            }
        }

        Ok(zip.finish()?.into_inner())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// A part decoded as UTF-8.
    pub fn get_str(&self, name: &str) -> Result<Option<&str>, RenderError> {
        match self.get(name) {
            Some(bytes) => std::str::from_utf8(bytes).map(Some).map_err(|_| RenderError::Utf8 {
                part: name.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Replace a part, or append it if the container has no part by that name.
    pub fn set(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        let name = name.into();
        let data = data.into();
        match self.parts.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = data,
            None => self.parts.push((name, data)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        let index = self.parts.iter().position(|(n, _)| n == name)?;
        Some(self.parts.remove(index).1)
    }

    /// Stream a part as UTF-8 text chunks of at most `chunk_size` bytes.
    pub fn stream_part(
        &self,
        name: &str,
        chunk_size: usize,
    ) -> Option<impl Stream<Item = Result<String, StreamError>> + '_> {
        self.get(name).map(|bytes| read_chunks(bytes, chunk_size))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

//! Input artifacts.
//!
//! An [`Archive`] is an opaque named byte source. Archives are grouped into
//! an [`ApiSurface`]: the primary archives make up the API under
//! comparison, while supplementary archives only serve to resolve
//! references and are pruned from the forest when nothing in the primary
//! set reaches them.

use std::io::{self, Cursor, Read};

use serde::{Deserialize, Serialize};

/// A named, readable input artifact.
pub trait Archive {
    fn name(&self) -> &str;

    /// Open the archive contents for reading. May be called repeatedly.
    fn open(&self) -> io::Result<Box<dyn Read + '_>>;
}

/// An archive backed by an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemoryArchive {
    name: String,
    bytes: Vec<u8>,
}

impl MemoryArchive {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        MemoryArchive {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl Archive for MemoryArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(&self.bytes)))
    }
}

/// Whether an archive is part of the API proper or only consulted to
/// resolve references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveRole {
    Primary,
    Supplementary,
}

/// Handle to an archive record in a forest's archive table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchiveId(pub(crate) u32);

impl ArchiveId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Archive provenance recorded on forest elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub name: String,
    pub role: ArchiveRole,
}

/// One side of a comparison: the primary archives plus the supplementary
/// set used for reference resolution.
#[derive(Default)]
pub struct ApiSurface {
    archives: Vec<Box<dyn Archive>>,
    supplementary: Vec<Box<dyn Archive>>,
}

impl ApiSurface {
    pub fn new() -> Self {
        ApiSurface::default()
    }

    pub fn with_archive(mut self, archive: impl Archive + 'static) -> Self {
        self.archives.push(Box::new(archive));
        self
    }

    pub fn with_supplementary(mut self, archive: impl Archive + 'static) -> Self {
        self.supplementary.push(Box::new(archive));
        self
    }

    pub fn archives(&self) -> &[Box<dyn Archive>] {
        &self.archives
    }

    pub fn supplementary(&self) -> &[Box<dyn Archive>] {
        &self.supplementary
    }

    /// Archive records for every artifact on this side, primary first, in
    /// the order they were supplied.
    pub fn records(&self) -> Vec<ArchiveRecord> {
        self.archives
            .iter()
            .map(|a| ArchiveRecord {
                name: a.name().to_string(),
                role: ArchiveRole::Primary,
            })
            .chain(self.supplementary.iter().map(|a| ArchiveRecord {
                name: a.name().to_string(),
                role: ArchiveRole::Supplementary,
            }))
            .collect()
    }
}

impl std::fmt::Debug for ApiSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSurface")
            .field(
                "archives",
                &self.archives.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field(
                "supplementary",
                &self
                    .supplementary
                    .iter()
                    .map(|a| a.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_archive_reads_back() {
        let archive = MemoryArchive::new("lib-1.0.json", b"{}".to_vec());
        let mut contents = String::new();
        archive.open().unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "{}");
        assert_eq!(archive.name(), "lib-1.0.json");
    }

    #[test]
    fn surface_records_primary_before_supplementary() {
        let surface = ApiSurface::new()
            .with_archive(MemoryArchive::new("api.json", Vec::new()))
            .with_supplementary(MemoryArchive::new("deps.json", Vec::new()));
        let records = surface.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "api.json");
        assert_eq!(records[0].role, ArchiveRole::Primary);
        assert_eq!(records[1].role, ArchiveRole::Supplementary);
    }
}

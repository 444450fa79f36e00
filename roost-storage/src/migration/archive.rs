//! Deterministic tar.gz backup archives.

use std::io::{self, Read, Write};

use chrono::{DateTime, Datelike, Timelike, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};
use tar::{Archive, Builder, EntryType, Header};

use crate::constants::{
    BACKUP_ARCHIVE_ENTRIES_COUNT_MAX, BACKUP_ARCHIVE_OWNER, BACKUP_FILE_EXTENSION,
    BACKUP_README_CONTENT, BACKUP_README_NAME,
};
use crate::storage::EntryKind;

/// One entry read from or written to an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Normalised path
    pub path: String,
    /// File or directory
    pub kind: EntryKind,
    /// File contents (empty for directories)
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    /// File entry.
    #[must_use]
    pub fn file(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
            data,
        }
    }

    /// Directory entry.
    #[must_use]
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
            data: Vec::new(),
        }
    }
}

/// `<prefix>-at-<H>h<M>min-<Y>-<m>-<d>.tar.gz`, fields unpadded.
#[must_use]
pub fn backup_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!(
        "{prefix}-at-{}h{}min-{}-{}-{}.{BACKUP_FILE_EXTENSION}",
        at.hour(),
        at.minute(),
        at.year(),
        at.month(),
        at.day()
    )
}

fn create_deterministic_tar<W: Write>(writer: W) -> Builder<GzEncoder<W>> {
    let encoder = GzBuilder::new()
        .mtime(0)
        .operating_system(255)
        .write(writer, Compression::best());

    let mut tar = Builder::new(encoder);
    tar.mode(tar::HeaderMode::Deterministic);
    tar
}

fn append<W: Write>(tar: &mut Builder<W>, entry: &ArchiveEntry) -> io::Result<()> {
    let mut header = Header::new_gnu();
    match entry.kind {
        EntryKind::File => {
            header.set_entry_type(EntryType::Regular);
            header.set_mode(0o644);
        }
        EntryKind::Directory => {
            header.set_entry_type(EntryType::Directory);
            header.set_mode(0o755);
        }
    }
    header.set_size(entry.data.len() as u64);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header.set_username(BACKUP_ARCHIVE_OWNER)?;
    header.set_groupname(BACKUP_ARCHIVE_OWNER)?;

    tar.append_data(&mut header, &entry.path, entry.data.as_slice())
}

/// Build a gzip-compressed tar of the readme followed by `entries` in order.
///
/// # Errors
/// Any I/O error from the tar or gzip writers (e.g. an unrepresentable path).
pub fn build_archive(entries: &[ArchiveEntry]) -> io::Result<Vec<u8>> {
    let mut tar = create_deterministic_tar(Vec::new());
    append(
        &mut tar,
        &ArchiveEntry::file(BACKUP_README_NAME, BACKUP_README_CONTENT.as_bytes().to_vec()),
    )?;
    for entry in entries {
        append(&mut tar, entry)?;
    }
    tar.into_inner()?.finish()
}

/// Read every file and directory entry, the leading generated readme excluded.
///
/// # Errors
/// Malformed gzip or tar data, or more than `BACKUP_ARCHIVE_ENTRIES_COUNT_MAX`
/// entries.
pub fn unpack_archive(bytes: &[u8]) -> io::Result<Vec<ArchiveEntry>> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut out = Vec::new();

    for (index, entry) in archive.entries()?.enumerate() {
        if index >= BACKUP_ARCHIVE_ENTRIES_COUNT_MAX {
            return Err(io::Error::other("archive has too many entries"));
        }
        let mut entry = entry?;
        let path = entry
            .path()?
            .to_string_lossy()
            .trim_end_matches('/')
            .to_string();
        if index == 0 && path == BACKUP_README_NAME {
            continue;
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            out.push(ArchiveEntry::directory(path));
        } else if entry_type.is_file() {
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            out.push(ArchiveEntry::file(path, data));
        } else {
            tracing::debug!(%path, "skipping non-file archive entry");
        }
    }
    Ok(out)
}

//! Zip packaging of an entry sequence.

use std::io::{Cursor, Read, Write};

use anyhow::Context;
use zip::write::SimpleFileOptions;

use super::ArchiveEntry;

/// Pack entries into an in-memory zip archive, preserving entry order.
///
/// Directory entries become zip directories; file entries stream their
/// payloads. Unreadable leaves were already dropped by the builder, so a
/// stream that fails to open here means the tree changed mid-publish, which
/// fails the pack.
pub fn pack(entries: &[ArchiveEntry<'_>]) -> anyhow::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = SimpleFileOptions::default();

        for entry in entries {
            if entry.is_directory {
                zip.add_directory(entry.path.trim_end_matches('/'), options)
                    .with_context(|| format!("Failed to add directory entry: {}", entry.path))?;
            } else {
                let stream = entry
                    .open()
                    .with_context(|| format!("File entry has no byte source: {}", entry.path))?;
                let mut stream = stream
                    .with_context(|| format!("Failed to open content for: {}", entry.path))?;

                zip.start_file(entry.path.as_str(), options)
                    .with_context(|| format!("Failed to start archive entry: {}", entry.path))?;
                let mut data = Vec::new();
                stream
                    .read_to_end(&mut data)
                    .with_context(|| format!("Failed to read content for: {}", entry.path))?;
                zip.write_all(&data)
                    .with_context(|| format!("Failed to write archive entry: {}", entry.path))?;
            }
        }

        zip.finish().context("Failed to finish zip archive")?;
    }
    Ok(buf.into_inner())
}

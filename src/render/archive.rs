use std::io::{Cursor, Write};

use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::render::error::RenderError;

/// `board_001.pdf`, `board_002.pdf`, ... for a zero-based index
pub fn entry_name(index: usize, ext: &str) -> String {
    format!("board_{:03}.{ext}", index + 1)
}

/// Packs named files into an in-memory zip, keeping their order
pub fn write_archive<I>(entries: I) -> Result<Vec<u8>, RenderError>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0;
    for (name, bytes) in entries {
        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
        count += 1;
    }

    let bytes = zip.finish()?.into_inner();
    log::debug!("archive with {count} entries, {} bytes", bytes.len());
    Ok(bytes)
}

#[cfg(test)]
pub(crate) fn archive_entries(bytes: &[u8]) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        entries.push((file.name().to_string(), data));
    }
    Ok(entries)
}

//! ZIP packaging of multi-track exports

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{MixdownError, Result};

/// Package named entries into an uncompressed ZIP archive, in the given order
pub fn write_zip(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options)
            .map_err(|e| MixdownError::encode(format!("zip entry '{}' failed: {}", name, e)))?;
        zip.write_all(bytes)?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| MixdownError::encode(format!("zip finalize failed: {}", e)))?;
    Ok(cursor.into_inner())
}

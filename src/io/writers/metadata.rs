use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::metadata::MetadataRecord;
use crate::types::MetadataFormat;

/// Separator used by delimited metadata files.
pub const DELIMITER: char = ',';

/// Write the record as pretty JSON next to `output_path`, with a `.json` extension.
pub fn write_json_sidecar(output_path: &Path, record: &MetadataRecord) -> crate::Result<PathBuf> {
    let sidecar_path = output_path.with_extension("json");
    std::fs::write(&sidecar_path, record.to_json()?)?;
    info!("Created metadata sidecar: {:?}", sidecar_path);
    Ok(sidecar_path)
}

/// Append one row to a delimited file, writing the header first when the
/// file is new or empty.
pub fn append_delimited(path: &Path, record: &MetadataRecord) -> crate::Result<()> {
    let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if needs_header {
        writeln!(file, "{}", record.delimited_header(DELIMITER))?;
    }
    writeln!(file, "{}", record.delimited_row(DELIMITER))?;
    info!("Appended metadata row for {} to {:?}", record.product_name, path);
    Ok(())
}

/// Write the sidecar selected by `format`. Returns the file written, if any.
pub fn handle_metadata(
    record: &MetadataRecord,
    format: MetadataFormat,
    output_path: &Path,
) -> crate::Result<Option<PathBuf>> {
    match format {
        MetadataFormat::Json => write_json_sidecar(output_path, record).map(Some),
        MetadataFormat::Delimited => {
            let path = output_path.with_extension("csv");
            append_delimited(&path, record)?;
            Ok(Some(path))
        }
        MetadataFormat::None => Ok(None),
    }
}

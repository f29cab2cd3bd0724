use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{debug, info};

use crate::error::{PipelineError, Result};
use crate::records::{Dataset, StrokeRecord, REQUIRED_COLUMNS};

/// Read the stroke dataset from a delimited file with a header row.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    info!("loading {}", path.display());
    let file = File::open(path)?;
    read_csv_from_reader(file)
}

pub fn read_csv_from_reader<R: Read>(reader: R) -> Result<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    debug!("header: {:?}", headers);
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(PipelineError::MissingColumn {
                column: column.to_owned(),
            });
        }
    }

    let records = rdr
        .deserialize::<StrokeRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    info!("loaded {} records", records.len());

    Dataset::from_records(&records)
}

use crate::sample::Sample;
use polars::prelude::*;
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const RAW_COLUMN_NAME: &str = "raw";
const VALUE_COLUMN_NAME: &str = "value";

/// `<destination>.csv`, the file a run writes to.
pub fn destination_path(destination: &Path) -> PathBuf {
    let mut path = OsString::from(destination.as_os_str());
    path.push(".csv");
    PathBuf::from(path)
}

/// One-column CSV writer receiving a run's samples.
pub struct CsvSink<W: Write = File> {
    writer: csv::Writer<W>,
    records: usize,
}

impl CsvSink<File> {
    /// Create `path`, truncating whatever a previous run left there.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(inner: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(b',')
            .from_writer(inner);
        Self { writer, records: 0 }
    }

    /// Write `sample` as one record.
    pub fn append(&mut self, sample: &Sample) -> Result<(), csv::Error> {
        self.writer.write_record([sample.as_str()])?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    /// Flush and return the number of records written.
    pub fn finish(mut self) -> Result<usize, csv::Error> {
        self.writer.flush()?;
        Ok(self.records)
    }

    pub fn into_inner(self) -> Result<W, csv::Error> {
        self.writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }
}

/// Load a recording written by [`CsvSink`].
///
/// `raw` holds the text as persisted, `value` the numeric reading or null
/// for no-data and unparseable records.
pub fn load_recording(path: impl AsRef<Path>) -> Result<DataFrame, PolarsError> {
    let data = std::fs::read(path.as_ref())?;
    if data.is_empty() {
        return DataFrame::new(vec![
            Series::new(RAW_COLUMN_NAME.into(), Vec::<String>::new()).into(),
            Series::new(VALUE_COLUMN_NAME.into(), Vec::<f64>::new()).into(),
        ]);
    }

    // No inference: every field stays text, exactly as the board sent it.
    CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(std::io::Cursor::new(data))
        .finish()?
        .lazy()
        .select([
            col("column_1").alias(RAW_COLUMN_NAME),
            col("column_1")
                .cast(DataType::Float64)
                .alias(VALUE_COLUMN_NAME),
        ])
        .collect()
}

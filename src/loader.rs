use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading an uploaded dataset
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no input file was saved for this request")]
    NoInputFile,

    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{0} contains no columns")]
    Empty(PathBuf),
}

/// In-memory table parsed from a headed CSV file
///
/// Cells are kept as strings; callers decide how to interpret a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataFrame {
    /// Load a CSV file whose first line names the columns
    ///
    /// # Arguments
    /// * `path` - Path to the CSV file to load
    ///
    /// # Returns
    /// * `Result<DataFrame, LoadError>` - The parsed table or the reader's error
    ///
    /// # Errors
    /// * Returns an error if the file cannot be opened or a record is malformed
    ///   (including rows whose length differs from the header)
    /// * Returns an error if the file has no header
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let wrap = |source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(wrap)?;
        let frame = Self::from_csv_reader(reader).map_err(wrap)?;

        if frame.columns.is_empty() {
            return Err(LoadError::Empty(path.to_path_buf()));
        }
        Ok(frame)
    }

    /// Parse CSV text from any reader
    pub fn from_reader<R: Read>(input: R) -> Result<Self, csv::Error> {
        Self::from_csv_reader(csv::ReaderBuilder::new().has_headers(true).from_reader(input))
    }

    fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, csv::Error> {
        let columns = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<Result<_, _>>()?;
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows (the header is not counted)
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Values of the named column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[index].as_str()).collect())
    }
}

/// Load the file saved for the current request
///
/// # Errors
/// * `LoadError::NoInputFile` when no file was saved
/// * Any error from `DataFrame::from_csv_path`
pub fn load_input(path: Option<&Path>) -> Result<DataFrame, LoadError> {
    let path = path.ok_or(LoadError::NoInputFile)?;
    DataFrame::from_csv_path(path)
}

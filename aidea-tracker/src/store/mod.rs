//! Daily log store
//!
//! One CSV file per calendar day (`<prefix>_YYYYMMDD.csv`) holding a header
//! row followed by one row per record. Rows are keyed by the record id column.
//!
//! All operations are blocking file I/O. Each one holds the per-date lock for
//! its whole duration, so appends and updates to the same day never
//! interleave. Updates rewrite the file through a sibling temporary file and
//! an atomic rename; a crash mid-update leaves the previous file intact.

mod locks;
mod reader;

pub use locks::{DateLocks, RecordLocks};
pub use reader::DayReader;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use aidea_common::record::{columns, decode, encode_for_headers, HeaderIndex, Record};
use aidea_common::{time, Activity};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Store of activities, the only record type persisted by the tracker
pub type ActivityLog = DailyLogStore<Activity>;

/// Store failures
///
/// A missing day-file and a missing row are distinct so callers can report
/// them separately from I/O trouble.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No day-file exists for the date
    #[error("No activity data for {date} ({})", path.display())]
    FileNotFound { date: NaiveDate, path: PathBuf },

    /// Day-file exists but holds no row with this id
    #[error("Record {id} not found in data for {date}")]
    RecordNotFound { id: String, date: NaiveDate },

    /// Day-file header lacks the id column
    #[error("Day-file {} has no {column} column", path.display())]
    MissingIdColumn { path: PathBuf, column: &'static str },

    /// File could not be opened, read or written
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// File content is not valid CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::FileNotFound { .. } | StoreError::RecordNotFound { .. }
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Day-partitioned CSV log of `R`
#[derive(Debug)]
pub struct DailyLogStore<R> {
    dir: PathBuf,
    prefix: String,
    locks: DateLocks,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> DailyLogStore<R> {
    /// Store writing `<dir>/<prefix>_YYYYMMDD.csv` files
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            locks: DateLocks::new(),
            _record: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<prefix>_YYYYMMDD.csv`
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}_{}.csv", self.prefix, time::date_stamp(date))
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(self.file_name(date))
    }

    /// Append `record` to today's file, creating it with a header if needed
    ///
    /// Returns the date of the file written.
    pub fn append(&self, record: &R) -> StoreResult<NaiveDate> {
        let date = time::today();
        self.append_on(date, record)?;
        Ok(date)
    }

    /// Append `record` to the file for `date`
    pub fn append_on(&self, date: NaiveDate, record: &R) -> StoreResult<()> {
        let path = self.path_for(date);
        let lock = self.locks.lock_for(date);
        let _guard = locks::acquire(&lock);

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;
        let len = file.metadata()?.len();

        let mut buf = Vec::new();
        let row = if len == 0 {
            let headers = columns::<R>();
            buf.extend(encode_row(&headers)?);
            encode_for_headers(record, &headers)
        } else {
            // An earlier torn write must not swallow this row
            if !ends_with_newline(&mut file, len)? {
                warn!(path = %path.display(), "Day-file missing final newline, terminating last row");
                buf.push(b'\n');
            }
            let headers = read_header(&mut file)?;
            encode_for_headers(record, &headers)
        };
        buf.extend(encode_row(&row)?);

        // One write per append; the lock keeps rows whole
        file.write_all(&buf)?;
        file.sync_data()?;

        debug!(
            id = record.record_id(),
            path = %path.display(),
            created = len == 0,
            "Record appended"
        );
        Ok(())
    }

    /// Find the first row whose id matches `id` in the file for `date`
    pub fn find_by_id(&self, id: &str, date: NaiveDate) -> StoreResult<R> {
        let snapshot = self.snapshot(date)?;
        let path = self.path_for(date);

        let mut reader = csv_reader(snapshot.as_slice());
        let header_row: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let headers = HeaderIndex::new(&header_row);
        let id_pos = id_position::<R>(&headers, &path)?;

        for row in reader.records() {
            let row = row?;
            if row.get(id_pos) != Some(id) {
                continue;
            }

            let decoded = decode::<R, _>(&row.iter().collect::<Vec<_>>(), &headers);
            if decoded.partial {
                warn!(id, path = %path.display(), "Record decoded with missing or unparseable fields");
            }
            return Ok(decoded.record);
        }

        Err(StoreError::RecordNotFound {
            id: id.to_string(),
            date,
        })
    }

    /// Replace the row whose id matches `record`'s id in the file for `date`
    ///
    /// Only the bytes of the target row change; every other row is copied
    /// through untouched.
    pub fn update(&self, record: &R, date: NaiveDate) -> StoreResult<()> {
        self.rewrite_row(record.record_id(), date, |header_row, _, _| {
            Ok((encode_for_headers(record, header_row), ()))
        })?;

        info!(id = record.record_id(), date = %date, "Record updated");
        Ok(())
    }

    /// Apply `change` to the stored row `id` of `date` and write it back
    ///
    /// The row is re-read under the date lock, so fields `change` does not
    /// touch keep whatever value is on disk at that moment. Returns the
    /// record as written.
    pub fn modify<F>(&self, id: &str, date: NaiveDate, change: F) -> StoreResult<R>
    where
        F: FnOnce(&mut R),
    {
        let path = self.path_for(date);
        let record = self.rewrite_row(id, date, |header_row, headers, row| {
            let decoded = decode::<R, _>(&row.iter().collect::<Vec<_>>(), headers);
            if decoded.partial {
                warn!(id, path = %path.display(), "Record decoded with missing or unparseable fields");
            }

            let mut record = decoded.record;
            change(&mut record);
            Ok((encode_for_headers(&record, header_row), record))
        })?;

        info!(id, date = %date, "Record modified");
        Ok(record)
    }

    /// Locate row `id` under the date lock and splice in the cells `replace`
    /// builds from the file header and the current row
    fn rewrite_row<T, F>(&self, id: &str, date: NaiveDate, replace: F) -> StoreResult<T>
    where
        F: FnOnce(&[String], &HeaderIndex, &csv::StringRecord) -> StoreResult<(Vec<String>, T)>,
    {
        let path = self.path_for(date);
        let lock = self.locks.lock_for(date);
        let _guard = locks::acquire(&lock);

        let content = read_existing(&path, date)?;

        let mut reader = csv_reader(content.as_slice());
        let header_row: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let headers = HeaderIndex::new(&header_row);
        let id_pos = id_position::<R>(&headers, &path)?;

        let mut span = None;
        let mut row = csv::StringRecord::new();
        loop {
            let start = reader.position().byte() as usize;
            if !reader.read_record(&mut row)? {
                break;
            }
            if row.get(id_pos) == Some(id) {
                span = Some((start, reader.position().byte() as usize));
                break;
            }
        }

        let Some((start, end)) = span else {
            return Err(StoreError::RecordNotFound {
                id: id.to_string(),
                date,
            });
        };

        let (cells, output) = replace(&header_row, &headers, &row)?;
        let replacement = encode_row(&cells)?;
        let mut rewritten = Vec::with_capacity(content.len() + replacement.len());
        rewritten.extend_from_slice(&content[..start]);
        rewritten.extend_from_slice(&replacement);
        rewritten.extend_from_slice(&content[end.min(content.len())..]);

        write_atomically(&path, &rewritten)?;
        Ok(output)
    }

    /// All records of `date`, decoded lazily from a consistent snapshot
    pub fn read_all(&self, date: NaiveDate) -> StoreResult<DayReader<R>> {
        let snapshot = self.snapshot(date)?;
        DayReader::new(snapshot, date, self.path_for(date))
    }

    /// Raw bytes of the file for `date`, for download
    pub fn read_raw(&self, date: NaiveDate) -> StoreResult<Vec<u8>> {
        self.snapshot(date)
    }

    fn snapshot(&self, date: NaiveDate) -> StoreResult<Vec<u8>> {
        let path = self.path_for(date);
        let lock = self.locks.lock_for(date);
        let _guard = locks::acquire(&lock);
        read_existing(&path, date)
    }
}

pub(crate) fn csv_reader<T: Read>(input: T) -> csv::Reader<T> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        // Rows written by older layouts may be shorter than the header
        .flexible(true)
        .from_reader(input)
}

fn encode_row<S: AsRef<[u8]>>(cells: &[S]) -> StoreResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(cells)?;
    writer
        .into_inner()
        .map_err(|e| StoreError::Io(io::Error::new(e.error().kind(), e.error().to_string())))
}

fn id_position<R: Record>(headers: &HeaderIndex, path: &Path) -> StoreResult<usize> {
    headers
        .position(R::ID_COLUMN)
        .ok_or_else(|| StoreError::MissingIdColumn {
            path: path.to_path_buf(),
            column: R::ID_COLUMN,
        })
}

fn read_existing(path: &Path, date: NaiveDate) -> StoreResult<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::FileNotFound {
            date,
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

fn read_header(file: &mut File) -> StoreResult<Vec<String>> {
    file.seek(SeekFrom::Start(0))?;
    let mut reader = csv_reader(&mut *file);
    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    Ok(headers)
}

fn ends_with_newline(file: &mut File, len: u64) -> StoreResult<bool> {
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Write `bytes` to a sibling temp file, flush it to disk, rename over `path`
fn write_atomically(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp_path = path.with_extension("csv.tmp");

    let result = (|| -> io::Result<()> {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

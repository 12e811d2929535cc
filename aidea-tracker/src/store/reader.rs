//! Lazy iteration over one day-file

use std::io::Cursor;
use std::marker::PhantomData;
use std::path::PathBuf;

use aidea_common::record::{decode, HeaderIndex, Record};
use chrono::NaiveDate;
use tracing::warn;

use super::StoreError;

/// Records of one day, decoded on demand
///
/// Iterates over a snapshot taken under the date lock, so concurrent appends
/// or updates never show up half-written.
pub struct DayReader<R> {
    rows: csv::StringRecordsIntoIter<Cursor<Vec<u8>>>,
    headers: HeaderIndex,
    date: NaiveDate,
    path: PathBuf,
    _record: PhantomData<R>,
}

impl<R: Record> DayReader<R> {
    pub(super) fn new(snapshot: Vec<u8>, date: NaiveDate, path: PathBuf) -> Result<Self, StoreError> {
        let mut reader = super::csv_reader(Cursor::new(snapshot));
        let header_row: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let headers = HeaderIndex::new(&header_row);

        Ok(Self {
            rows: reader.into_records(),
            headers,
            date,
            path,
            _record: PhantomData,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

impl<R: Record> Iterator for DayReader<R> {
    type Item = Result<R, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e.into())),
        };

        let decoded = decode::<R, _>(&row.iter().collect::<Vec<_>>(), &self.headers);
        if decoded.partial {
            warn!(
                path = %self.path.display(),
                id = decoded.record.record_id(),
                "Row decoded with missing or unparseable fields"
            );
        }
        Some(Ok(decoded.record))
    }
}

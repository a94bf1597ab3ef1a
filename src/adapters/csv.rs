//! CSV adapters built on `csv-async`.
//!
//! Records travel as `Vec<String>`. Malformed records become error items and
//! reading continues with the next record.

use async_trait::async_trait;
use csv_async::{AsyncReader, AsyncReaderBuilder, AsyncWriter, StringRecord};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::core::{Context, Destination, Options, Source};
use crate::error::{Error, Result};
use crate::pipeline::{Generator, Sink};
use crate::sinks::to_destination;
use crate::sources::from_source;

/// A CSV record.
pub type Record = Vec<String>;

/// Reads CSV records.
pub struct CsvSource<R> {
    reader: AsyncReader<R>,
    record: StringRecord,
    discard_header: bool,
}

impl<R: AsyncRead + Unpin + Send + 'static> CsvSource<R> {
    /// Comma-separated records; the first line is data.
    pub fn new(reader: R) -> Self {
        Self::from_builder(AsyncReaderBuilder::new(), reader)
    }

    /// Use `builder` for delimiter, quoting and flexibility settings.
    ///
    /// Header handling is controlled by [`discard_header`](Self::discard_header),
    /// not by the builder.
    pub fn from_builder(mut builder: AsyncReaderBuilder, reader: R) -> Self {
        builder.has_headers(false);
        Self {
            reader: builder.create_reader(reader),
            record: StringRecord::new(),
            discard_header: false,
        }
    }

    /// Skip the first record.
    pub fn discard_header(mut self) -> Self {
        self.discard_header = true;
        self
    }

    async fn read(&mut self) -> Result<bool> {
        Ok(self.reader.read_record(&mut self.record).await?)
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send + 'static> Source for CsvSource<R> {
    type Item = Record;

    async fn next(&mut self, _ctx: &Context) -> Result<Record> {
        if self.discard_header {
            self.discard_header = false;
            if !self.read().await? {
                return Err(Error::EndOfStream);
            }
        }

        if !self.read().await? {
            return Err(Error::EndOfStream);
        }
        Ok(self.record.iter().map(String::from).collect())
    }
}

/// Emit the comma-separated records of `reader`.
///
/// For other dialects or header skipping, wrap a configured [`CsvSource`]
/// with [`from_source`].
///
/// # Panics
///
/// Panics if `opts` is invalid.
pub fn from_reader<R>(reader: R, opts: Options) -> Generator<Record>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    from_source(CsvSource::new(reader), opts)
}

/// Writes CSV records.
pub struct CsvDestination<W: AsyncWrite + Unpin> {
    writer: AsyncWriter<W>,
}

impl<W: AsyncWrite + Unpin + Send + 'static> CsvDestination<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: AsyncWriter::from_writer(writer),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + 'static> Destination for CsvDestination<W> {
    type Item = Record;

    async fn write(&mut self, _ctx: &Context, record: Record) -> Result<()> {
        self.writer.write_record(&record).await?;
        Ok(())
    }

    async fn flush(&mut self, _ctx: &Context) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Write every record to `writer`, flushing before the sink closes.
///
/// # Panics
///
/// Panics if `opts` is invalid.
pub fn to_writer<W>(writer: W, opts: Options) -> Sink<Record>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    to_destination(CsvDestination::new(writer), opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Item;
    use crate::util::collect;
    use std::io::Cursor;

    fn reader(data: &str) -> Cursor<Vec<u8>> {
        Cursor::new(data.as_bytes().to_vec())
    }

    fn rows(items: Vec<Item<Record>>) -> Vec<Record> {
        items.into_iter().filter_map(|i| i.ok()).collect()
    }

    fn strings(rows: &[&[&str]]) -> Vec<Record> {
        rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect()
    }

    #[tokio::test]
    async fn reads_every_record() {
        let g = from_reader(reader("1,2,3\n4,5,6\n7,8,9\n"), Options::new());
        let items = collect(g.generate(Context::new())).await;

        assert_eq!(rows(items), strings(&[&["1", "2", "3"], &["4", "5", "6"], &["7", "8", "9"]]));
    }

    #[tokio::test]
    async fn malformed_records_become_errors() {
        let g = from_reader(reader("1,2,3\n4,5,6\nerror\n7,8,9\n"), Options::new());
        let items = collect(g.generate(Context::new())).await;

        assert_eq!(items.len(), 4);
        assert!(matches!(items[2], Err(Error::Csv(_))));
        assert_eq!(rows(items), strings(&[&["1", "2", "3"], &["4", "5", "6"], &["7", "8", "9"]]));
    }

    #[tokio::test]
    async fn custom_dialect_and_header() {
        let mut builder = AsyncReaderBuilder::new();
        builder.delimiter(b';');
        let source = CsvSource::from_builder(builder, reader("a;b\n1;2\n3;4\n")).discard_header();

        let items = collect(from_source(source, Options::new()).generate(Context::new())).await;
        assert_eq!(rows(items), strings(&[&["1", "2"], &["3", "4"]]));
    }

    #[tokio::test]
    async fn header_only_input_is_empty() {
        let source = CsvSource::new(reader("a,b\n")).discard_header();
        let items = collect(from_source(source, Options::new()).generate(Context::new())).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let file = tokio::fs::File::create(&path).await.unwrap();

        let p = from_reader(reader("x,\"y,z\"\n1,2\n"), Options::new()).pipe(to_writer(file, Options::new()));
        assert!(collect(p.generate(Context::new())).await.is_empty());

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, "x,\"y,z\"\n1,2\n");
    }
}

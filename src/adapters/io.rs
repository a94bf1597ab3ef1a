//! Adapters for tokio readers and writers.

use async_trait::async_trait;
use std::marker::PhantomData;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::debug;

use crate::core::{Context, Destination, Options, Source};
use crate::error::{Error, Result};
use crate::pipeline::{Generator, Sink};
use crate::sinks::to_destination;
use crate::sources::from_source;

/// Default chunk size of [`ReaderSource`].
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Reads byte chunks of at most `chunk_size` bytes.
///
/// A read error is emitted once, after which the source reports end of stream.
pub struct ReaderSource<R> {
    reader: R,
    buf: Vec<u8>,
    failed: bool,
}

impl<R: AsyncRead + Unpin + Send + 'static> ReaderSource<R> {
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be greater than 0");
        Self {
            reader,
            buf: vec![0; chunk_size],
            failed: false,
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send + 'static> Source for ReaderSource<R> {
    type Item = Vec<u8>;

    async fn next(&mut self, _ctx: &Context) -> Result<Vec<u8>> {
        if self.failed {
            return Err(Error::EndOfStream);
        }

        match self.reader.read(&mut self.buf).await {
            Ok(0) => Err(Error::EndOfStream),
            Ok(n) => Ok(self.buf[..n].to_vec()),
            Err(e) => {
                debug!(error = %e, "reader failed");
                self.failed = true;
                Err(e.into())
            }
        }
    }
}

/// Emit the content of `reader` as byte chunks.
///
/// # Panics
///
/// Panics if `chunk_size` is zero or `opts` is invalid.
pub fn from_reader<R>(reader: R, chunk_size: usize, opts: Options) -> Generator<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    from_source(ReaderSource::new(reader, chunk_size), opts)
}

/// Reads lines, without their line terminator.
///
/// A read error is emitted once, after which the source reports end of stream.
pub struct LinesSource<R> {
    lines: Lines<R>,
    failed: bool,
}

impl<R: AsyncBufRead + Unpin + Send + 'static> LinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            failed: false,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send + 'static> Source for LinesSource<R> {
    type Item = String;

    async fn next(&mut self, _ctx: &Context) -> Result<String> {
        if self.failed {
            return Err(Error::EndOfStream);
        }

        match self.lines.next_line().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(Error::EndOfStream),
            Err(e) => {
                debug!(error = %e, "line reader failed");
                self.failed = true;
                Err(e.into())
            }
        }
    }
}

/// Emit the lines of `reader`.
///
/// # Panics
///
/// Panics if `opts` is invalid.
pub fn from_lines<R>(reader: R, opts: Options) -> Generator<String>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    from_source(LinesSource::new(reader), opts)
}

/// Writes every item's bytes to the underlying writer.
pub struct WriterDestination<W, T> {
    writer: W,
    _phantom: PhantomData<T>,
}

impl<W, T> WriterDestination<W, T>
where
    W: AsyncWrite + Unpin + Send + 'static,
    T: AsRef<[u8]> + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<W, T> Destination for WriterDestination<W, T>
where
    W: AsyncWrite + Unpin + Send + 'static,
    T: AsRef<[u8]> + Send + 'static,
{
    type Item = T;

    async fn write(&mut self, _ctx: &Context, item: T) -> Result<()> {
        self.writer.write_all(item.as_ref()).await?;
        Ok(())
    }

    async fn flush(&mut self, _ctx: &Context) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Write every item to `writer`, flushing it before the sink closes.
///
/// # Panics
///
/// Panics if `opts` is invalid.
pub fn to_writer<W, T>(writer: W, opts: Options) -> Sink<T>
where
    W: AsyncWrite + Unpin + Send + 'static,
    T: AsRef<[u8]> + Send + 'static,
{
    to_destination(WriterDestination::new(writer), opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Item;
    use crate::processors::map;
    use crate::util::collect;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::task::{Context as TaskContext, Poll};

    #[tokio::test]
    async fn reads_in_chunks() {
        let g = from_reader(Cursor::new(b"abcdefg".to_vec()), 3, Options::new());

        let chunks: Vec<Vec<u8>> = collect(g.generate(Context::new()))
            .await
            .into_iter()
            .map(|i| i.unwrap())
            .collect();
        assert_eq!(chunks.concat(), b"abcdefg");
        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= 3));
    }

    struct Broken;

    impl AsyncRead for Broken {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::other("disk on fire")))
        }
    }

    #[tokio::test]
    async fn read_errors_are_emitted_once() {
        let items = collect(from_reader(Broken, 8, Options::new()).generate(Context::new())).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn reads_lines() {
        let g = from_lines(Cursor::new("one\ntwo\r\nthree".to_string()), Options::new());

        let lines: Vec<String> = collect(g.generate(Context::new()))
            .await
            .into_iter()
            .map(|i| i.unwrap())
            .collect();
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn writes_and_flushes_to_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let file = tokio::fs::File::create(&path).await.unwrap();

        let p = from_lines(Cursor::new("a\nb\nc\n".to_string()), Options::new())
            .pipe(map(|_, line: Item<String>| async move { Ok(format!("{}!\n", line?)) }, Options::new()))
            .pipe(to_writer(file, Options::new()));

        let items = collect(p.generate(Context::new())).await;
        assert!(items.is_empty());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "a!\nb!\nc!\n");
    }
}

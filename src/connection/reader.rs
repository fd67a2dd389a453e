// src/connection/reader.rs

//! A socket reader that yields at most one bounded chunk per readiness event.

use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::AsyncRead;
use tokio::net::tcp::OwnedReadHalf;
use tokio_util::io::poll_read_buf;

/// One observation from a client's read side.
#[derive(Debug)]
pub enum ReadEvent {
    /// Up to `chunk_size` bytes were read.
    Data(Bytes),
    /// The peer closed its side: the read returned zero bytes.
    Closed,
    /// The read failed.
    Failed(std::io::Error),
}

/// Turns a read half into a stream of `ReadEvent`s, each read bounded to
/// `chunk_size` bytes so one chatty client cannot monopolize a loop pass.
///
/// Unlike a plain byte stream, end-of-file is reported as an explicit
/// `ReadEvent::Closed` item before the stream ends, so a stream map holding
/// the reader observes disconnects instead of silently dropping the entry.
#[derive(Debug)]
pub struct ChunkReader<R = OwnedReadHalf> {
    reader: R,
    buf: BytesMut,
    chunk_size: usize,
    finished: bool,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size: chunk_size.max(1),
            finished: false,
        }
    }

    /// Returns the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: AsyncRead + Unpin> Stream for ChunkReader<R> {
    type Item = ReadEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ReadEvent>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        this.buf.reserve(this.chunk_size);
        let mut limited = (&mut this.buf).limit(this.chunk_size);
        let event = match ready!(poll_read_buf(Pin::new(&mut this.reader), cx, &mut limited)) {
            Ok(0) => {
                this.finished = true;
                ReadEvent::Closed
            }
            Ok(_) => ReadEvent::Data(this.buf.split().freeze()),
            Err(e) => {
                this.finished = true;
                ReadEvent::Failed(e)
            }
        };
        Poll::Ready(Some(event))
    }
}

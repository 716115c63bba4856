// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Chunked bulk transfer with cancellation and bounded draining.
// Author: Lukas Bower

//! Out-of-band file transfer.
//!
//! Uploads follow the call message and downloads precede the reply. Either
//! stream ends with an end-of-stream chunk or a cancelled chunk. A receiver
//! that gives up sends a cancel frame and then discards chunks until the
//! sender's terminator arrives, at most [`MAX_DRAIN_CHUNKS`] of them.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::chunk::{Chunk, Progress};
use crate::constants::{MAX_CHUNK_SIZE, MAX_DRAIN_CHUNKS};
use crate::error::WireError;
use crate::link::{Frame, Link};

/// Lock-free cancellation flag. Clones share the flag, so it can be set from
/// another thread or a signal handler while a transfer runs.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag before the next call.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// How a transfer ended.
#[derive(Debug)]
pub enum StreamOutcome {
    Complete { bytes: u64 },
    Cancelled,
    /// The local file could not be read or written; the stream was
    /// terminated cleanly.
    Failed(io::Error),
}

fn send_chunk<L: Link + ?Sized>(link: &mut L, chunk: &Chunk) -> Result<(), WireError> {
    link.write_message(&chunk.encode()?)
}

fn read_chunk<L: Link + ?Sized>(
    link: &mut L,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<Chunk, WireError> {
    loop {
        match link.read_frame()? {
            Frame::Message(payload) => return Chunk::decode(&payload),
            Frame::Progress(progress) => on_progress(progress),
            other => return Err(WireError::UnexpectedFrame(other.label())),
        }
    }
}

/// Discard chunks until the sender's terminator. Fails with
/// [`WireError::DrainLimit`] when the sender does not stop in time.
pub fn drain_chunks<L: Link + ?Sized>(link: &mut L) -> Result<usize, WireError> {
    let mut drained = 0usize;
    loop {
        let chunk = match link.read_frame()? {
            Frame::Message(payload) => Chunk::decode(&payload)?,
            // Late notifications and repeated cancels carry nothing to drain.
            Frame::Progress(_) | Frame::Cancel => continue,
            Frame::Launch => return Err(WireError::UnexpectedFrame("launch")),
        };
        if chunk.is_terminator() {
            debug!("[stream] drained {drained} chunks");
            return Ok(drained);
        }
        drained += 1;
        if drained > MAX_DRAIN_CHUNKS {
            return Err(WireError::DrainLimit {
                limit: MAX_DRAIN_CHUNKS,
            });
        }
    }
}

/// Client side of an upload: feed `reader` to the daemon as chunks.
///
/// Stops early with a cancelled chunk when `cancel` is set or the daemon
/// asks for cancellation.
pub fn send_stream<L: Link + ?Sized, R: Read + ?Sized>(
    link: &mut L,
    reader: &mut R,
    cancel: &CancelHandle,
) -> Result<StreamOutcome, WireError> {
    let mut buf = vec![0u8; MAX_CHUNK_SIZE];
    let mut sent = 0u64;
    loop {
        if cancel.is_cancelled() || link.poll_cancel()? {
            debug!("[stream] upload cancelled after {sent} bytes");
            send_chunk(link, &Chunk::Cancelled)?;
            return Ok(StreamOutcome::Cancelled);
        }
        let count = match reader.read(&mut buf) {
            Ok(count) => count,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("[stream] upload source failed: {err}");
                send_chunk(link, &Chunk::Cancelled)?;
                return Ok(StreamOutcome::Failed(err));
            }
        };
        if count == 0 {
            send_chunk(link, &Chunk::End)?;
            return Ok(StreamOutcome::Complete { bytes: sent });
        }
        send_chunk(link, &Chunk::Data(buf[..count].to_vec()))?;
        sent += count as u64;
    }
}

/// Client side of a download: write chunks into `writer` until the daemon
/// terminates the stream.
pub fn receive_stream<L: Link + ?Sized, W: Write + ?Sized>(
    link: &mut L,
    writer: &mut W,
    cancel: &CancelHandle,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<StreamOutcome, WireError> {
    let mut received = 0u64;
    let mut cancel_sent = false;
    let mut drained = 0usize;
    let mut local_error: Option<io::Error> = None;
    loop {
        if !cancel_sent && cancel.is_cancelled() {
            link.write_frame(&Frame::Cancel)?;
            cancel_sent = true;
        }
        match read_chunk(link, on_progress)? {
            Chunk::Data(data) => {
                if cancel_sent {
                    drained += 1;
                    if drained > MAX_DRAIN_CHUNKS {
                        return Err(WireError::DrainLimit {
                            limit: MAX_DRAIN_CHUNKS,
                        });
                    }
                    continue;
                }
                if let Err(err) = writer.write_all(&data) {
                    warn!("[stream] download sink failed: {err}");
                    local_error = Some(err);
                    link.write_frame(&Frame::Cancel)?;
                    cancel_sent = true;
                    continue;
                }
                received += data.len() as u64;
            }
            chunk => {
                if let Some(err) = local_error.take() {
                    return Ok(StreamOutcome::Failed(err));
                }
                if cancel_sent || chunk == Chunk::Cancelled {
                    return Ok(StreamOutcome::Cancelled);
                }
                writer.flush()?;
                return Ok(StreamOutcome::Complete { bytes: received });
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Finished,
    Cancelled,
}

fn link_error(err: WireError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

fn cancelled_error() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "transfer cancelled")
}

/// Daemon side of an upload. Holds the stream position between reads so the
/// link can be lent to other users, such as progress notifications.
#[derive(Debug)]
pub struct IncomingStream {
    buf: Vec<u8>,
    pos: usize,
    state: State,
    received: u64,
}

impl Default for IncomingStream {
    fn default() -> Self {
        Self::new()
    }
}

impl IncomingStream {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            state: State::Open,
            received: 0,
        }
    }

    /// Bytes handed to the reader so far.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received
    }

    /// The sender's terminator has been read.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state != State::Open
    }

    /// The stream ended with a cancellation from either side.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state == State::Cancelled
    }

    pub fn read(
        &mut self,
        link: &mut dyn Link,
        cancel: &CancelHandle,
        out: &mut [u8],
    ) -> io::Result<usize> {
        while self.pos >= self.buf.len() {
            match self.state {
                State::Finished => return Ok(0),
                State::Cancelled => return Err(cancelled_error()),
                State::Open => {}
            }
            if cancel.is_cancelled() {
                return Err(cancelled_error());
            }
            match read_chunk(link, &mut |_| {}).map_err(link_error)? {
                Chunk::Data(data) => {
                    self.buf = data;
                    self.pos = 0;
                }
                Chunk::End => self.state = State::Finished,
                Chunk::Cancelled => {
                    debug!("[stream] upload cancelled by sender");
                    self.state = State::Cancelled;
                }
            }
        }
        let count = out.len().min(self.buf.len() - self.pos);
        out[..count].copy_from_slice(&self.buf[self.pos..self.pos + count]);
        self.pos += count;
        self.received += count as u64;
        Ok(count)
    }

    /// Leave the stream in sync: when the sender has not finished, ask it to
    /// stop and drain what is still in flight. Returns whether a
    /// cancellation was needed.
    pub fn close(&mut self, link: &mut dyn Link) -> Result<bool, WireError> {
        if self.is_terminated() {
            return Ok(false);
        }
        link.write_frame(&Frame::Cancel)?;
        drain_chunks(link)?;
        self.state = State::Cancelled;
        Ok(true)
    }
}

/// Daemon side of a download, buffered into full chunks.
#[derive(Debug, Default)]
pub struct OutgoingStream {
    buf: Vec<u8>,
    cancelled: bool,
    terminated: bool,
    sent: u64,
}

impl OutgoingStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// A cancellation was observed while writing.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn check_cancel(&mut self, link: &mut dyn Link, cancel: &CancelHandle) -> io::Result<()> {
        if !self.cancelled && (cancel.is_cancelled() || link.poll_cancel().map_err(link_error)?) {
            debug!("[stream] download cancelled after {} bytes", self.sent);
            self.cancelled = true;
        }
        if self.cancelled {
            return Err(cancelled_error());
        }
        Ok(())
    }

    fn send_buffered(&mut self, link: &mut dyn Link) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let data = std::mem::take(&mut self.buf);
        let len = data.len() as u64;
        send_chunk(link, &Chunk::Data(data)).map_err(link_error)?;
        self.sent += len;
        Ok(())
    }

    pub fn write(
        &mut self,
        link: &mut dyn Link,
        cancel: &CancelHandle,
        data: &[u8],
    ) -> io::Result<usize> {
        self.check_cancel(link, cancel)?;
        let room = MAX_CHUNK_SIZE - self.buf.len();
        let count = data.len().min(room);
        self.buf.extend_from_slice(&data[..count]);
        if self.buf.len() == MAX_CHUNK_SIZE {
            self.send_buffered(link)?;
        }
        Ok(count)
    }

    pub fn flush(&mut self, link: &mut dyn Link, cancel: &CancelHandle) -> io::Result<()> {
        self.check_cancel(link, cancel)?;
        self.send_buffered(link)
    }

    /// Terminate the stream. Returns `false` when it had been cancelled, in
    /// which case a cancelled chunk was sent instead of the end marker.
    pub fn finish(&mut self, link: &mut dyn Link, cancel: &CancelHandle) -> Result<bool, WireError> {
        if self.terminated {
            return Ok(!self.cancelled);
        }
        match self.flush(link, cancel) {
            Ok(()) => {}
            Err(_) if self.cancelled => {}
            Err(err) => return Err(WireError::Io(err)),
        }
        self.terminated = true;
        if self.cancelled {
            send_chunk(link, &Chunk::Cancelled)?;
            Ok(false)
        } else {
            send_chunk(link, &Chunk::End)?;
            Ok(true)
        }
    }

    /// Terminate the stream after a failure of the producer.
    pub fn abort(&mut self, link: &mut dyn Link) -> Result<(), WireError> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        self.buf.clear();
        send_chunk(link, &Chunk::Cancelled)
    }
}

/// [`Read`] adapter over an [`IncomingStream`].
pub struct StreamReader<'a> {
    pub(crate) stream: &'a mut IncomingStream,
    pub(crate) link: &'a mut dyn Link,
    pub(crate) cancel: &'a CancelHandle,
}

impl<'a> StreamReader<'a> {
    pub fn new(
        stream: &'a mut IncomingStream,
        link: &'a mut dyn Link,
        cancel: &'a CancelHandle,
    ) -> Self {
        Self {
            stream,
            link,
            cancel,
        }
    }
}

impl Read for StreamReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(self.link, self.cancel, buf)
    }
}

/// [`Write`] adapter over an [`OutgoingStream`].
pub struct StreamWriter<'a> {
    pub(crate) stream: &'a mut OutgoingStream,
    pub(crate) link: &'a mut dyn Link,
    pub(crate) cancel: &'a CancelHandle,
}

impl<'a> StreamWriter<'a> {
    pub fn new(
        stream: &'a mut OutgoingStream,
        link: &'a mut dyn Link,
        cancel: &'a CancelHandle,
    ) -> Self {
        Self {
            stream,
            link,
            cancel,
        }
    }
}

impl Write for StreamWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(self.link, self.cancel, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush(self.link, self.cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::duplex;
    use std::thread;

    #[test]
    fn upload_round_trips_through_chunks() {
        let (mut client, mut daemon) = duplex();
        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();
        let sender = thread::spawn(move || {
            let cancel = CancelHandle::new();
            send_stream(&mut client, &mut payload.as_slice(), &cancel).expect("send")
        });
        let mut incoming = IncomingStream::new();
        let cancel = CancelHandle::new();
        let mut received = Vec::new();
        StreamReader::new(&mut incoming, &mut daemon, &cancel)
            .read_to_end(&mut received)
            .expect("read");
        assert_eq!(received, expected);
        assert!(incoming.is_terminated());
        assert!(!incoming.close(&mut daemon).expect("close"));
        match sender.join().expect("sender thread") {
            StreamOutcome::Complete { bytes } => assert_eq!(bytes, 20_000),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn receiver_cancel_drains_and_stops_sender() {
        let (mut client, mut daemon) = duplex();
        let sender = thread::spawn(move || {
            let cancel = CancelHandle::new();
            let mut endless = io::repeat(0xAB);
            send_stream(&mut client, &mut endless, &cancel).expect("send")
        });
        let mut incoming = IncomingStream::new();
        let cancel = CancelHandle::new();
        let mut first = [0u8; 16];
        StreamReader::new(&mut incoming, &mut daemon, &cancel)
            .read_exact(&mut first)
            .expect("first bytes");
        assert!(incoming.close(&mut daemon).expect("close"));
        assert!(matches!(
            sender.join().expect("sender thread"),
            StreamOutcome::Cancelled
        ));
    }

    #[test]
    fn drain_gives_up_on_runaway_sender() {
        let (mut client, mut daemon) = duplex();
        let sender = thread::spawn(move || {
            for _ in 0..=MAX_DRAIN_CHUNKS {
                if send_chunk(&mut client, &Chunk::Data(vec![1])).is_err() {
                    return;
                }
            }
        });
        assert!(matches!(
            drain_chunks(&mut daemon),
            Err(WireError::DrainLimit { .. })
        ));
        drop(daemon);
        sender.join().expect("sender thread");
    }
}

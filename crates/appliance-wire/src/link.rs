// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Length-word framing and the link abstraction between client and daemon.
// Author: Lukas Bower

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};

use log::trace;

use crate::chunk::Progress;
use crate::constants::{CANCEL_FLAG, LAUNCH_FLAG, MESSAGE_MAX, PROGRESS_FLAG, PROGRESS_MESSAGE_LEN};
use crate::error::WireError;

/// Frames a link can carry, told apart by the leading length word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Call, reply or stream chunk.
    Message(Vec<u8>),
    Cancel,
    Progress(Progress),
    Launch,
}

impl Frame {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Cancel => "cancel",
            Self::Progress(_) => "progress",
            Self::Launch => "launch",
        }
    }

    /// Serialise with the leading length word.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        let mut out = Vec::new();
        match self {
            Self::Message(payload) => {
                if payload.len() > MESSAGE_MAX {
                    return Err(WireError::Oversize {
                        what: "message",
                        len: payload.len(),
                        limit: MESSAGE_MAX,
                    });
                }
                out.reserve(4 + payload.len());
                out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                out.extend_from_slice(payload);
            }
            Self::Cancel => out.extend_from_slice(&CANCEL_FLAG.to_be_bytes()),
            Self::Progress(progress) => {
                out.extend_from_slice(&PROGRESS_FLAG.to_be_bytes());
                out.extend_from_slice(&progress.encode());
            }
            Self::Launch => out.extend_from_slice(&LAUNCH_FLAG.to_be_bytes()),
        }
        Ok(out)
    }

    /// Parse one complete frame including its length word.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < 4 {
            return Err(WireError::Truncated);
        }
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[..4]);
        let body = &bytes[4..];
        let exact = |len: usize| {
            if body.len() < len {
                Err(WireError::Truncated)
            } else if body.len() > len {
                Err(WireError::TrailingBytes {
                    remaining: body.len() - len,
                })
            } else {
                Ok(())
            }
        };
        match u32::from_be_bytes(word) {
            CANCEL_FLAG => {
                exact(0)?;
                Ok(Self::Cancel)
            }
            LAUNCH_FLAG => {
                exact(0)?;
                Ok(Self::Launch)
            }
            PROGRESS_FLAG => {
                exact(PROGRESS_MESSAGE_LEN)?;
                Ok(Self::Progress(Progress::decode(body)?))
            }
            len => {
                let len = len as usize;
                if len > MESSAGE_MAX {
                    return Err(WireError::Oversize {
                        what: "message",
                        len,
                        limit: MESSAGE_MAX,
                    });
                }
                exact(len)?;
                Ok(Self::Message(body.to_vec()))
            }
        }
    }
}

/// Bidirectional frame transport between the library and the daemon.
pub trait Link {
    /// Block until the next frame arrives.
    fn read_frame(&mut self) -> Result<Frame, WireError>;

    fn write_frame(&mut self, frame: &Frame) -> Result<(), WireError>;

    /// Consume a cancel frame from the peer if one is already waiting.
    /// Never blocks; other waiting frames keep their order.
    fn poll_cancel(&mut self) -> Result<bool, WireError>;

    fn write_message(&mut self, payload: &[u8]) -> Result<(), WireError> {
        self.write_frame(&Frame::Message(payload.to_vec()))
    }

    /// Read a frame that must be a message.
    fn read_message(&mut self) -> Result<Vec<u8>, WireError> {
        match self.read_frame()? {
            Frame::Message(payload) => Ok(payload),
            other => Err(WireError::UnexpectedFrame(other.label())),
        }
    }
}

/// Frames buffered per direction before a writer blocks.
pub const LINK_QUEUE_DEPTH: usize = 16;

/// In-process link backed by bounded channels. Each end may move to its
/// own thread.
pub struct MemoryLink {
    name: &'static str,
    tx: SyncSender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<Vec<u8>>,
}

/// Create the two connected ends of an in-process link.
#[must_use]
pub fn duplex() -> (MemoryLink, MemoryLink) {
    let (client_tx, daemon_rx) = mpsc::sync_channel(LINK_QUEUE_DEPTH);
    let (daemon_tx, client_rx) = mpsc::sync_channel(LINK_QUEUE_DEPTH);
    (
        MemoryLink {
            name: "client",
            tx: client_tx,
            rx: client_rx,
            pending: VecDeque::new(),
        },
        MemoryLink {
            name: "daemon",
            tx: daemon_tx,
            rx: daemon_rx,
            pending: VecDeque::new(),
        },
    )
}

impl MemoryLink {
    fn fill_pending(&mut self) -> Result<(), WireError> {
        loop {
            match self.rx.try_recv() {
                Ok(bytes) => self.pending.push_back(bytes),
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    return if self.pending.is_empty() {
                        Err(WireError::LinkClosed)
                    } else {
                        Ok(())
                    }
                }
            }
        }
    }
}

impl Link for MemoryLink {
    fn read_frame(&mut self) -> Result<Frame, WireError> {
        let bytes = match self.pending.pop_front() {
            Some(bytes) => bytes,
            None => self.rx.recv().map_err(|_| WireError::LinkClosed)?,
        };
        let frame = Frame::from_bytes(&bytes)?;
        trace!("[link][{}] read {} frame", self.name, frame.label());
        Ok(frame)
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), WireError> {
        let bytes = frame.to_bytes()?;
        trace!(
            "[link][{}] write {} frame ({} bytes)",
            self.name,
            frame.label(),
            bytes.len()
        );
        self.tx.send(bytes).map_err(|_| WireError::LinkClosed)
    }

    fn poll_cancel(&mut self) -> Result<bool, WireError> {
        self.fill_pending()?;
        let cancel = CANCEL_FLAG.to_be_bytes();
        match self
            .pending
            .iter()
            .position(|bytes| bytes.as_slice() == cancel)
        {
            Some(index) => {
                self.pending.remove(index);
                trace!("[link][{}] peer cancel observed", self.name);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_words_are_not_lengths() {
        for frame in [Frame::Cancel, Frame::Launch] {
            let bytes = frame.to_bytes().expect("bytes");
            assert_eq!(bytes.len(), 4);
            assert_eq!(Frame::from_bytes(&bytes).expect("parse"), frame);
        }
    }

    #[test]
    fn oversize_length_word_is_rejected() {
        let bytes = ((MESSAGE_MAX + 1) as u32).to_be_bytes();
        assert!(matches!(
            Frame::from_bytes(&bytes),
            Err(WireError::Oversize { what: "message", .. })
        ));
    }

    #[test]
    fn poll_cancel_keeps_other_frames_in_order() {
        let (mut client, mut daemon) = duplex();
        daemon
            .write_frame(&Frame::Progress(Progress {
                proc_nr: 23,
                serial: 1,
                position: 1,
                total: 2,
            }))
            .expect("progress");
        daemon.write_frame(&Frame::Cancel).expect("cancel");
        daemon.write_message(b"reply").expect("reply");
        assert!(client.poll_cancel().expect("poll"));
        assert!(!client.poll_cancel().expect("poll again"));
        assert_eq!(client.read_frame().expect("frame").label(), "progress");
        assert_eq!(client.read_message().expect("message"), b"reply".to_vec());
    }

    #[test]
    fn dropped_peer_closes_the_link() {
        let (mut client, daemon) = duplex();
        drop(daemon);
        assert!(matches!(client.read_frame(), Err(WireError::LinkClosed)));
    }
}

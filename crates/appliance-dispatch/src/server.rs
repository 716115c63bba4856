// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Daemon main loop: decode calls, run natives, encode replies.
// Author: Lukas Bower

use action_registry::StreamDirection;
use appliance_wire::constants::CANCELLED_ERRNO;
use std::sync::atomic::{AtomicBool, Ordering};

use appliance_wire::{
    decode_call_args, decode_header, encode_reply, ApplicationError, CallArgs, CallLayout,
    CancelHandle, Chunk, Direction, Frame, Header, IncomingStream, Link, OutgoingStream, Reply,
    Value, WireError, WireKind,
};
use log::{debug, info, trace, warn};

use crate::context::{CallContext, Transfer};
use crate::progress::{ProgressLimiter, ProgressPolicy};
use crate::table::{DispatchTable, Entry};

/// Serves one connection, one call at a time.
pub struct Dispatcher {
    table: DispatchTable,
    cancel: CancelHandle,
    progress: ProgressPolicy,
    /// Set after rejecting a call we could not route: an upload the client
    /// already started will keep sending chunks we must not answer.
    skip_chunks: AtomicBool,
}

fn cancelled() -> ApplicationError {
    ApplicationError::new(CANCELLED_ERRNO, "operation cancelled")
}

impl Dispatcher {
    #[must_use]
    pub fn new(table: DispatchTable) -> Self {
        Self {
            table,
            cancel: CancelHandle::new(),
            progress: ProgressPolicy::default(),
            skip_chunks: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_progress_policy(mut self, policy: ProgressPolicy) -> Self {
        self.progress = policy;
        self
    }

    #[must_use]
    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    /// Cancellation hook for the call in flight. Setting it never blocks and
    /// is safe from any thread; the flag is cleared when the next call starts.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Tell the library the daemon is ready.
    pub fn announce(&self, link: &mut dyn Link) -> Result<(), WireError> {
        info!("[dispatch] announcing readiness");
        link.write_frame(&Frame::Launch)
    }

    /// Announce, then serve calls until the peer hangs up. Returns the
    /// number of calls served.
    pub fn serve(&self, link: &mut dyn Link) -> Result<u64, WireError> {
        self.announce(link)?;
        let mut served = 0u64;
        loop {
            match self.serve_one(link) {
                Ok(()) => served += 1,
                Err(WireError::LinkClosed) => {
                    info!("[dispatch] link closed after {served} calls");
                    return Ok(served);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Read one call and answer it. Only link failures are returned; every
    /// call-level failure becomes a reply.
    pub fn serve_one(&self, link: &mut dyn Link) -> Result<(), WireError> {
        let payload = self.next_message(link)?;
        let (header, body) = match decode_header(&payload) {
            Ok(parts) => parts,
            Err(err) => {
                warn!("[dispatch] undecodable call header: {err}");
                self.skip_chunks.store(true, Ordering::Relaxed);
                return send_reply(
                    link,
                    0,
                    0,
                    &WireKind::Unit,
                    &Reply::Protocol(ApplicationError::protocol(err.to_string())),
                );
            }
        };
        if header.direction != Direction::Call {
            warn!("[dispatch] proc {} serial {}: not a call", header.proc_nr, header.serial);
            self.skip_chunks.store(true, Ordering::Relaxed);
            return send_reply(
                link,
                header.proc_nr,
                header.serial,
                &WireKind::Unit,
                &Reply::Protocol(ApplicationError::protocol("message is not a call")),
            );
        }
        let Some(entry) = self.table.get(header.proc_nr) else {
            warn!("[dispatch] unknown procedure {}", header.proc_nr);
            self.skip_chunks.store(true, Ordering::Relaxed);
            return send_reply(
                link,
                header.proc_nr,
                header.serial,
                &WireKind::Unit,
                &Reply::Protocol(ApplicationError::protocol(format!(
                    "unknown procedure number {}",
                    header.proc_nr
                ))),
            );
        };
        let layout = entry.layout();
        let args = match decode_call_args(layout, &header, body) {
            Ok(args) => args,
            Err(err) => {
                warn!("[dispatch] {}: cannot decode arguments: {err}", layout.name);
                abandon_stream(link, layout)?;
                let message = format!("{}: {err}", layout.name);
                return send_reply(
                    link,
                    header.proc_nr,
                    header.serial,
                    &layout.reply,
                    &Reply::Protocol(ApplicationError::protocol(message)),
                );
            }
        };
        debug!(
            "[dispatch] {} proc={} serial={} args={}",
            layout.name,
            header.proc_nr,
            header.serial,
            layout.redacted(&args.required)
        );
        self.cancel.reset();
        let reply = match self.run(link, entry, header, args)? {
            Ok(value) => Reply::Ok(value),
            Err(err) => {
                debug!("[dispatch] {} failed: {err}", layout.name);
                Reply::Application(err)
            }
        };
        send_reply(link, header.proc_nr, header.serial, &layout.reply, &reply)
    }

    /// Next message frame that is not a stray chunk. Cancels that crossed a
    /// finished stream are dropped as well.
    fn next_message(&self, link: &mut dyn Link) -> Result<Vec<u8>, WireError> {
        loop {
            let payload = match link.read_frame()? {
                Frame::Message(payload) => payload,
                other => {
                    trace!("[dispatch] ignoring {} frame between calls", other.label());
                    continue;
                }
            };
            if self.skip_chunks.load(Ordering::Relaxed) && decode_header(&payload).is_err() {
                if let Ok(chunk) = Chunk::decode(&payload) {
                    debug!("[dispatch] dropping chunk of a rejected call");
                    if chunk.is_terminator() {
                        self.skip_chunks.store(false, Ordering::Relaxed);
                    }
                    continue;
                }
            }
            self.skip_chunks.store(false, Ordering::Relaxed);
            return Ok(payload);
        }
    }

    fn run(
        &self,
        link: &mut dyn Link,
        entry: &Entry,
        header: Header,
        args: CallArgs,
    ) -> Result<Result<Value, ApplicationError>, WireError> {
        let layout = entry.layout();
        if let Err(err) = check_paths(layout, &args) {
            abandon_stream(link, layout)?;
            return Ok(Err(err));
        }
        let Some(native) = entry.native() else {
            abandon_stream(link, layout)?;
            let message = match entry.feature() {
                Some(feature) => format!("{}: feature '{feature}' is not available", layout.name),
                None => format!("{}: not supported by this appliance", layout.name),
            };
            return Ok(Err(ApplicationError::new("ENOTSUP", message)));
        };

        let transfer = match layout.stream {
            None => Transfer::None,
            Some(StreamDirection::Upload) => Transfer::Upload(IncomingStream::new()),
            Some(StreamDirection::Download) => Transfer::Download(OutgoingStream::new()),
        };
        let mut ctx = CallContext::new(
            layout,
            header,
            args,
            &mut *link,
            &self.cancel,
            transfer,
            ProgressLimiter::new(self.progress),
        );
        let result = native(&mut ctx);
        let transfer = ctx.into_transfer();

        Ok(match transfer {
            Transfer::None => result,
            Transfer::Upload(mut stream) => {
                let interrupted = stream.is_cancelled() || self.cancel.is_cancelled();
                if stream.close(link)? {
                    debug!(
                        "[dispatch] {}: upload stopped after {} bytes",
                        layout.name,
                        stream.received()
                    );
                }
                match result {
                    Err(_) if interrupted => Err(cancelled()),
                    other => other,
                }
            }
            Transfer::Download(mut stream) => match result {
                Ok(value) => {
                    if stream.finish(link, &self.cancel)? {
                        Ok(value)
                    } else {
                        Err(cancelled())
                    }
                }
                Err(err) => {
                    let interrupted = stream.is_cancelled() || self.cancel.is_cancelled();
                    stream.abort(link)?;
                    Err(if interrupted { cancelled() } else { err })
                }
            },
        })
    }
}

/// Keep the link in sync when a streaming call is answered before its
/// native runs: refuse the upload, or end the download at once.
fn abandon_stream(link: &mut dyn Link, layout: &CallLayout) -> Result<(), WireError> {
    match layout.stream {
        None => Ok(()),
        Some(StreamDirection::Upload) => IncomingStream::new().close(link).map(|_| ()),
        Some(StreamDirection::Download) => OutgoingStream::new().abort(link),
    }
}

fn check_paths(layout: &CallLayout, args: &CallArgs) -> Result<(), ApplicationError> {
    for (slot, value) in layout.args.iter().zip(&args.required) {
        if !slot.absolute_path {
            continue;
        }
        if let Some(path) = value.as_str() {
            if !path.starts_with('/') {
                return Err(ApplicationError::new(
                    "EINVAL",
                    format!("{}: {}: path must start with a / character", layout.name, slot.name),
                ));
            }
        }
    }
    Ok(())
}

fn send_reply(
    link: &mut dyn Link,
    proc_nr: u32,
    serial: u32,
    kind: &WireKind,
    reply: &Reply,
) -> Result<(), WireError> {
    let bytes = match encode_reply(proc_nr, serial, kind, reply) {
        Ok(bytes) => bytes,
        Err(err) => {
            // A native returned a value that does not fit its declared shape.
            warn!("[dispatch] proc {proc_nr} serial {serial}: cannot encode reply: {err}");
            encode_reply(
                proc_nr,
                serial,
                kind,
                &Reply::Application(ApplicationError::new("EIO", err.to_string())),
            )?
        }
    };
    link.write_message(&bytes)
}

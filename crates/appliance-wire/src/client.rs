// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Library-side call driver used by generated bindings.
// Author: Lukas Bower

use std::io::{Read, Write};
use std::sync::Arc;

use action_registry::StreamDirection;
use log::{debug, info, trace};

use crate::chunk::Progress;
use crate::error::{ApplicationError, CallError, WireError};
use crate::layout::{CallLayout, Protocol};
use crate::link::{Frame, Link};
use crate::message::{decode_reply, encode_call, Reply};
use crate::stream::{receive_stream, send_stream, CancelHandle, StreamOutcome};
use crate::value::{CallArgs, Value};

type ProgressCallback = Box<dyn FnMut(Progress) + Send>;

/// Issues one call at a time over a link to the daemon.
pub struct Client<L: Link> {
    link: L,
    protocol: Arc<Protocol>,
    serial: u32,
    cancel: CancelHandle,
    on_progress: Option<ProgressCallback>,
}

enum Transfer<'a> {
    None,
    Upload(&'a mut dyn Read),
    Download(&'a mut dyn Write),
}

impl<L: Link> Client<L> {
    pub fn new(link: L, protocol: Arc<Protocol>) -> Self {
        Self {
            link,
            protocol,
            serial: 0,
            cancel: CancelHandle::new(),
            on_progress: None,
        }
    }

    /// Block until the daemon announces it is ready. Stray frames before
    /// the announcement are discarded.
    pub fn wait_for_launch(&mut self) -> Result<(), WireError> {
        loop {
            match self.link.read_frame()? {
                Frame::Launch => {
                    info!("[client] daemon ready");
                    return Ok(());
                }
                other => trace!("[client] ignoring {} frame before launch", other.label()),
            }
        }
    }

    /// Handle that cancels the current transfer; may be used from any thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Register a callback for progress notifications. Calls made while a
    /// callback is set ask the daemon for progress.
    pub fn set_progress_callback(&mut self, callback: impl FnMut(Progress) + Send + 'static) {
        self.on_progress = Some(Box::new(callback));
    }

    #[must_use]
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Call an action that does not stream.
    pub fn call(&mut self, name: &str, args: &CallArgs) -> Result<Value, CallError> {
        self.run(name, args, Transfer::None)
    }

    /// Call an upload action, streaming `source` to the daemon.
    pub fn call_upload(
        &mut self,
        name: &str,
        args: &CallArgs,
        source: &mut dyn Read,
    ) -> Result<Value, CallError> {
        self.run(name, args, Transfer::Upload(source))
    }

    /// Call a download action, streaming the daemon's output into `sink`.
    pub fn call_download(
        &mut self,
        name: &str,
        args: &CallArgs,
        sink: &mut dyn Write,
    ) -> Result<Value, CallError> {
        self.run(name, args, Transfer::Download(sink))
    }

    fn layout(&self, name: &str) -> Result<CallLayout, CallError> {
        self.protocol
            .by_name(name)
            .cloned()
            .ok_or_else(|| {
                let message = format!("no daemon action named {name}");
                CallError::Protocol(ApplicationError::protocol(message))
            })
    }

    fn run(&mut self, name: &str, args: &CallArgs, transfer: Transfer<'_>) -> Result<Value, CallError> {
        let layout = self.layout(name)?;
        let expected = match &transfer {
            Transfer::None => None,
            Transfer::Upload(_) => Some(StreamDirection::Upload),
            Transfer::Download(_) => Some(StreamDirection::Download),
        };
        if expected != layout.stream {
            return Err(WireError::ArgumentCount {
                what: "streams",
                expected: usize::from(layout.stream.is_some()),
                actual: usize::from(expected.is_some()),
            }
            .into());
        }

        self.cancel.reset();
        self.serial = self.serial.wrapping_add(1);
        let serial = self.serial;
        let progress_hint = u64::from(layout.progress && self.on_progress.is_some());
        let payload = encode_call(&layout, serial, progress_hint, args)?;
        debug!(
            "[client] call {} proc={} serial={} args={}",
            layout.name,
            layout.proc_nr,
            serial,
            layout.redacted(&args.required)
        );
        self.link.write_message(&payload)?;

        let mut on_progress = |progress: Progress| {
            if let Some(callback) = self.on_progress.as_mut() {
                callback(progress);
            }
        };
        let outcome = match transfer {
            Transfer::None => None,
            Transfer::Upload(source) => Some(send_stream(&mut self.link, source, &self.cancel)?),
            Transfer::Download(sink) => Some(receive_stream(
                &mut self.link,
                sink,
                &self.cancel,
                &mut on_progress,
            )?),
        };
        let reply = read_reply(&mut self.link, &layout, serial, &mut on_progress)?;
        let cancelled = self.cancel.is_cancelled();

        match (outcome, reply) {
            (Some(StreamOutcome::Failed(err)), _) => Err(WireError::Io(err).into()),
            (_, Reply::Protocol(err)) => Err(CallError::Protocol(err)),
            (_, Reply::Application(_)) if cancelled => Err(CallError::Cancelled),
            (_, Reply::Application(err)) => {
                debug!("[client] {} failed: {}", layout.name, err);
                Err(CallError::Application(err))
            }
            // The daemon stopping an upload early is not a cancellation.
            (Some(StreamOutcome::Cancelled), Reply::Ok(_)) if cancelled => {
                Err(CallError::Cancelled)
            }
            (_, Reply::Ok(value)) => Ok(value),
        }
    }
}

fn read_reply<L: Link + ?Sized>(
    link: &mut L,
    layout: &CallLayout,
    serial: u32,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<Reply, WireError> {
    loop {
        match link.read_frame()? {
            Frame::Message(payload) => return decode_reply(layout, serial, &payload),
            Frame::Progress(progress) => on_progress(progress),
            // A cancel that crossed the end of the stream.
            Frame::Cancel => continue,
            Frame::Launch => return Err(WireError::UnexpectedFrame("launch")),
        }
    }
}

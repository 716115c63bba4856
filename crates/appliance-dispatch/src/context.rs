// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Per-call context handed to native implementations.
// Author: Lukas Bower

use std::time::Instant;

use appliance_wire::{
    ApplicationError, CallArgs, CallLayout, CancelHandle, Frame, Header, IncomingStream, Link,
    OutgoingStream, Progress, StreamReader, StreamWriter, Value,
};
use log::warn;

use crate::progress::ProgressLimiter;

/// Stream attached to the running call.
#[derive(Debug)]
pub(crate) enum Transfer {
    None,
    Upload(IncomingStream),
    Download(OutgoingStream),
}

/// Everything a native implementation sees of the call it serves.
pub struct CallContext<'a> {
    layout: &'a CallLayout,
    header: Header,
    args: CallArgs,
    link: &'a mut dyn Link,
    cancel: &'a CancelHandle,
    transfer: Transfer,
    progress: ProgressLimiter,
}

fn invalid(message: String) -> ApplicationError {
    ApplicationError::new("EINVAL", message)
}

impl<'a> CallContext<'a> {
    pub(crate) fn new(
        layout: &'a CallLayout,
        header: Header,
        args: CallArgs,
        link: &'a mut dyn Link,
        cancel: &'a CancelHandle,
        transfer: Transfer,
        progress: ProgressLimiter,
    ) -> Self {
        Self {
            layout,
            header,
            args,
            link,
            cancel,
            transfer,
            progress,
        }
    }

    pub(crate) fn into_transfer(self) -> Transfer {
        self.transfer
    }

    /// Name of the action being served.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.layout.name
    }

    #[must_use]
    pub fn serial(&self) -> u32 {
        self.header.serial
    }

    #[must_use]
    pub fn args(&self) -> &CallArgs {
        &self.args
    }

    /// Required argument by parameter name.
    pub fn required(&self, name: &str) -> Result<&Value, ApplicationError> {
        self.layout
            .args
            .iter()
            .position(|slot| slot.name == name)
            .and_then(|index| self.args.required.get(index))
            .ok_or_else(|| invalid(format!("{}: no parameter named {name}", self.layout.name)))
    }

    /// Required string argument by parameter name.
    pub fn string(&self, name: &str) -> Result<&str, ApplicationError> {
        self.required(name)?.as_str().ok_or_else(|| {
            invalid(format!("{}: parameter {name} is not a string", self.layout.name))
        })
    }

    /// Optional argument by name; `None` when the caller left it unset.
    #[must_use]
    pub fn optional(&self, name: &str) -> Option<&Value> {
        self.layout
            .optarg_index(name)
            .and_then(|index| self.args.optional.get(index))
            .and_then(Option::as_ref)
    }

    /// Optional boolean, `false` when unset.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.optional(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Reader over the uploaded file. Fails for actions without an upload.
    pub fn upload(&mut self) -> Result<StreamReader<'_>, ApplicationError> {
        match &mut self.transfer {
            Transfer::Upload(stream) => Ok(StreamReader::new(stream, &mut *self.link, self.cancel)),
            _ => Err(invalid(format!("{} does not take an upload", self.layout.name))),
        }
    }

    /// Writer for the downloaded file. Fails for actions without a download.
    pub fn download(&mut self) -> Result<StreamWriter<'_>, ApplicationError> {
        match &mut self.transfer {
            Transfer::Download(stream) => {
                Ok(StreamWriter::new(stream, &mut *self.link, self.cancel))
            }
            _ => Err(invalid(format!("{} does not produce a download", self.layout.name))),
        }
    }

    /// Report progress. Silently dropped unless the caller asked for
    /// progress and the action reports it; otherwise rate limited.
    pub fn report_progress(&mut self, position: u64, total: u64) {
        if self.header.progress_hint == 0 || !self.layout.progress {
            return;
        }
        if !self.progress.admit(position, total, Instant::now()) {
            return;
        }
        let frame = Frame::Progress(Progress {
            proc_nr: self.header.proc_nr,
            serial: self.header.serial,
            position,
            total,
        });
        if let Err(err) = self.link.write_frame(&frame) {
            warn!("[dispatch] {}: progress notification failed: {err}", self.layout.name);
        }
    }

    /// The call has been cancelled, locally or by the peer's stream.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
            || match &self.transfer {
                Transfer::Upload(stream) => stream.is_cancelled(),
                Transfer::Download(stream) => stream.is_cancelled(),
                Transfer::None => false,
            }
    }

    /// Handle that cancels this call from another thread.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

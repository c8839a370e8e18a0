//!
//! Status line capture.
//!
//! ureq exposes only the numeric status of a response. The connector below wraps the default
//! one and reads the final status line, reason phrase included, off the connection input.
//!
use std::sync::{Arc, Mutex};

use ureq::unversioned::transport::{
    Buffers, ConnectionDetails, Connector, DefaultConnector, NextTimeout, Transport,
};

use super::HttpStatus;

/// Last final status line seen on the connections of one agent
#[derive(Clone, Debug, Default)]
pub(super) struct StatusSlot(Arc<Mutex<Option<HttpStatus>>>);

impl StatusSlot {
    pub(super) fn take(&self) -> Option<HttpStatus> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }

    fn store(&self, status: HttpStatus) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(status);
        }
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

// HTTP/1.1 200 Everything Fine
fn parse_status_line(line: &[u8]) -> Option<HttpStatus> {
    let line = String::from_utf8_lossy(line);
    let rest = line.strip_prefix("HTTP/1.")?;
    let (_, rest) = rest.split_once(' ')?;
    let (code, reason) = rest.split_once(' ').unwrap_or((rest, ""));
    if code.len() != 3 {
        return None;
    }
    let code = code.parse::<u16>().ok()?;
    Some(HttpStatus::new(code, reason.trim()))
}

/// Find the final status line at the start of the input, skipping interim 1xx heads
fn final_status(mut input: &[u8]) -> Option<HttpStatus> {
    while input.starts_with(b"HTTP/") {
        let line_end = find_subsequence(input, b"\r\n")?;
        let status = parse_status_line(&input[..line_end])?;
        if status.code() >= 200 {
            return Some(status);
        }
        let head_end = find_subsequence(input, b"\r\n\r\n")?;
        input = &input[head_end + 4..];
    }
    None
}

#[derive(Debug)]
pub(super) struct StatusLineConnector {
    inner: DefaultConnector,
    slot: StatusSlot,
}

impl StatusLineConnector {
    pub(super) fn new(slot: StatusSlot) -> Self {
        StatusLineConnector {
            inner: DefaultConnector::new(),
            slot,
        }
    }
}

impl Connector for StatusLineConnector {
    type Out = StatusLineTransport;

    fn connect(
        &self,
        details: &ConnectionDetails,
        chained: Option<()>,
    ) -> Result<Option<Self::Out>, ureq::Error> {
        Ok(self
            .inner
            .connect(details, chained)?
            .map(|inner| StatusLineTransport {
                inner,
                slot: self.slot.clone(),
            }))
    }
}

#[derive(Debug)]
pub(super) struct StatusLineTransport {
    inner: Box<dyn Transport>,
    slot: StatusSlot,
}

impl Transport for StatusLineTransport {
    fn buffers(&mut self) -> &mut dyn Buffers {
        self.inner.buffers()
    }

    fn transmit_output(&mut self, amount: usize, timeout: NextTimeout) -> Result<(), ureq::Error> {
        self.inner.transmit_output(amount, timeout)
    }

    fn await_input(&mut self, timeout: NextTimeout) -> Result<bool, ureq::Error> {
        let progress = self.inner.await_input(timeout)?;
        if let Some(status) = final_status(self.inner.buffers().input()) {
            self.slot.store(status);
        }
        Ok(progress)
    }

    fn is_open(&mut self) -> bool {
        self.inner.is_open()
    }

    fn is_tls(&self) -> bool {
        self.inner.is_tls()
    }
}

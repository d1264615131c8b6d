//! Test doubles shared by unit tests across modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::decoder::{Attachment, Column, DecodedPacket, Decoder, Protocol};
use crate::error::DecodeError;
use crate::session::SessionId;
use crate::unit::ParseUnit;

const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Poll `cond` until it holds, failing the test after a few seconds.
pub async fn wait_until(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Protocol whose decoders behave according to the packet bytes:
///
/// - `none`: no decoder (undefined is bound)
/// - `fail`: decode returns an error and leaves the decoder undecoded
/// - `panic`: decode panics
/// - `gate`: decode signals `wait_started` then blocks until `open_gate`
/// - anything else: summary is the packet text
pub struct ScriptedProtocol {
    name: String,
    columns: Vec<Column>,
    attachment: Attachment,
    created: AtomicUsize,
    decode_calls: Arc<AtomicUsize>,
    gate: (Sender<()>, Receiver<()>),
    started: (Sender<()>, Receiver<()>),
    events: Mutex<Vec<String>>,
}

impl ScriptedProtocol {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: vec![Column::new("Summary", 40)],
            attachment: Attachment::new(),
            created: AtomicUsize::new(0),
            decode_calls: Arc::new(AtomicUsize::new(0)),
            gate: crossbeam_channel::unbounded(),
            started: crossbeam_channel::unbounded(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::named("scripted"))
    }

    pub fn decoders_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn decode_calls(&self) -> usize {
        self.decode_calls.load(Ordering::SeqCst)
    }

    /// Block until a `gate` decoder has started decoding.
    pub fn wait_started(&self) {
        self.started
            .1
            .recv_timeout(WAIT_LIMIT)
            .expect("gated decode never started");
    }

    pub fn open_gate(&self) {
        let _ = self.gate.0.send(());
    }

    /// `load:<thread>` / `unload:<thread>` entries in call order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn record(&self, what: &str) {
        let thread = thread::current().name().unwrap_or("unnamed").to_string();
        self.events.lock().push(format!("{}:{}", what, thread));
    }
}

impl Protocol for ScriptedProtocol {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn create_decoder(&self, unit: &ParseUnit) -> Option<Box<dyn Decoder>> {
        let calls = Arc::clone(&self.decode_calls);
        let decoder: Box<dyn Decoder> = match &unit.data()[..] {
            b"none" => return None,
            b"fail" => Box::new(FailingDecoder { calls }),
            b"panic" => Box::new(PanickingDecoder { calls }),
            b"gate" => Box::new(GatedDecoder {
                calls,
                started: self.started.0.clone(),
                gate: self.gate.1.clone(),
                decoded: false,
            }),
            _ => Box::new(EchoDecoder { calls, decoded: false }),
        };
        self.created.fetch_add(1, Ordering::SeqCst);
        Some(decoder)
    }

    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn on_load(&self, _session: SessionId) {
        self.record("load");
    }

    fn on_unload(&self, _session: SessionId) {
        self.record("unload");
    }
}

struct EchoDecoder {
    calls: Arc<AtomicUsize>,
    decoded: bool,
}

impl Decoder for EchoDecoder {
    fn is_decoded(&self) -> bool {
        self.decoded
    }

    fn decode(&mut self, packet: &[u8]) -> Result<Option<DecodedPacket>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.decoded = true;
        Ok(Some(DecodedPacket::with_summary(String::from_utf8_lossy(packet))))
    }
}

struct FailingDecoder {
    calls: Arc<AtomicUsize>,
}

impl Decoder for FailingDecoder {
    fn is_decoded(&self) -> bool {
        false
    }

    fn decode(&mut self, _packet: &[u8]) -> Result<Option<DecodedPacket>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DecodeError::Malformed("scripted failure".to_string()))
    }
}

struct PanickingDecoder {
    calls: Arc<AtomicUsize>,
}

impl Decoder for PanickingDecoder {
    fn is_decoded(&self) -> bool {
        false
    }

    fn decode(&mut self, _packet: &[u8]) -> Result<Option<DecodedPacket>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("scripted decoder panic");
    }
}

struct GatedDecoder {
    calls: Arc<AtomicUsize>,
    started: Sender<()>,
    gate: Receiver<()>,
    decoded: bool,
}

impl Decoder for GatedDecoder {
    fn is_decoded(&self) -> bool {
        self.decoded
    }

    fn decode(&mut self, packet: &[u8]) -> Result<Option<DecodedPacket>, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.started.send(());
        let _ = self.gate.recv_timeout(WAIT_LIMIT);
        self.decoded = true;
        Ok(Some(DecodedPacket::with_summary(String::from_utf8_lossy(packet))))
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pktview::conf::{MemorySettings, ViewerConfig, WorkerConfig};
use pktview::decoder::{Attachment, Column, DecodedPacket, Decoder, Protocol};
use pktview::error::DecodeError;
use pktview::host::{PresentationHost, ThreadDispatcher};
use pktview::log::{CaptureLog, LogSource};
use pktview::protocols::{HexProtocol, TextProtocol};
use pktview::session::{SessionEvent, ViewerSession};
use pktview::unit::ParseUnit;
use tokio::runtime::Handle;

/// Counts bytes; first byte 0xff makes the decoder give up.
struct LengthProtocol {
    columns: Vec<Column>,
    attachment: Attachment,
}

impl LengthProtocol {
    fn new() -> Self {
        Self {
            columns: vec![Column::new("Len", 5)],
            attachment: Attachment::new(),
        }
    }
}

impl Protocol for LengthProtocol {
    fn name(&self) -> &str {
        "Length"
    }

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn create_decoder(&self, _unit: &ParseUnit) -> Option<Box<dyn Decoder>> {
        Some(Box::new(LengthDecoder { decoded: false }))
    }

    fn attachment(&self) -> &Attachment {
        &self.attachment
    }
}

struct LengthDecoder {
    decoded: bool,
}

impl Decoder for LengthDecoder {
    fn is_decoded(&self) -> bool {
        self.decoded
    }

    fn decode(&mut self, packet: &[u8]) -> Result<Option<DecodedPacket>, DecodeError> {
        if packet.first() == Some(&0xff) {
            return Err(DecodeError::Malformed("reserved marker".to_string()));
        }
        self.decoded = true;
        Ok(Some(DecodedPacket::with_summary(format!("len={}", packet.len()))))
    }
}

struct Harness {
    host: Arc<ThreadDispatcher>,
    session: Arc<ViewerSession>,
}

fn harness() -> Harness {
    let mut config = ViewerConfig::default();
    config.worker = WorkerConfig {
        idle_poll_ms: 5,
        idle_polls: 100,
    };

    let host = Arc::new(ThreadDispatcher::spawn("viewer-ui").unwrap());
    let session = ViewerSession::new(
        &config,
        Arc::clone(&host) as Arc<dyn PresentationHost>,
        Arc::new(MemorySettings::new()),
        Handle::current(),
    );
    Harness { host, session }
}

async fn wait_until(cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn summaries(session: &ViewerSession) -> Vec<Option<String>> {
    session
        .items()
        .snapshot()
        .iter()
        .map(|u| u.payload().and_then(|p| p.summary.clone()))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_text_packets_decode_on_first_read() {
    let h = harness();
    let log = Arc::new(CaptureLog::new("capture"));
    log.append(&b"level=info msg=started"[..]);
    log.append(&b"plain line"[..]);

    h.session.set_protocol(Some(Arc::new(TextProtocol::new()))).unwrap();
    h.session.set_log(Some(Arc::clone(&log) as Arc<dyn LogSource>)).unwrap();
    log.append(&b"msg=\"after attach\""[..]);

    assert_eq!(h.session.items().len(), 3);
    for i in 0..3 {
        assert!(h.session.query(i).is_none(), "nothing decoded before the first read");
    }
    wait_until(|| h.session.items().snapshot().iter().all(|u| u.is_decoded())).await;

    assert_eq!(
        summaries(&h.session),
        vec![
            Some("started".to_string()),
            Some("plain line".to_string()),
            Some("after attach".to_string()),
        ]
    );
    assert_eq!(h.session.query(0).unwrap().field("level"), Some("info"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_protocol_switch_redecodes_with_new_protocol() {
    let h = harness();
    let log = Arc::new(CaptureLog::new("capture"));
    log.append(&b"abcd"[..]);

    h.session.set_protocol(Some(Arc::new(HexProtocol::new()))).unwrap();
    h.session.set_log(Some(log as Arc<dyn LogSource>)).unwrap();

    h.session.query(0);
    wait_until(|| h.session.is_settled() && h.session.items().get(0).unwrap().is_decoded()).await;
    assert_eq!(summaries(&h.session), vec![Some("4 bytes".to_string())]);

    let hex = h.session.protocol().unwrap();
    h.session.set_protocol(Some(Arc::new(LengthProtocol::new()))).unwrap();
    assert!(!hex.is_attached());
    assert_eq!(summaries(&h.session), vec![None]);

    h.session.query(0);
    wait_until(|| h.session.items().get(0).unwrap().is_decoded()).await;
    assert_eq!(summaries(&h.session), vec![Some("len=4".to_string())]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_packet_does_not_stall_the_rest() {
    let h = harness();
    let log = Arc::new(CaptureLog::new("capture"));
    log.append(vec![0xff, 0x01]);
    log.append(&b"ok"[..]);

    h.session.set_protocol(Some(Arc::new(LengthProtocol::new()))).unwrap();
    h.session.set_log(Some(log as Arc<dyn LogSource>)).unwrap();

    h.session.query(0);
    h.session.query(1);
    wait_until(|| h.session.items().get(1).unwrap().is_decoded() && h.session.is_settled()).await;

    let first = h.session.items().get(0).unwrap();
    assert!(!first.is_decoded());
    assert_eq!(h.session.metrics().scheduler.failed, 1);
    assert_eq!(summaries(&h.session), vec![None, Some("len=2".to_string())]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_listeners_run_on_presentation_thread() {
    let h = harness();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    h.session.subscribe(move |event| {
        let thread = std::thread::current().name().unwrap_or("").to_string();
        sink.lock().push((thread, event.clone()));
    });

    let log = Arc::new(CaptureLog::new("capture"));
    h.session.set_log(Some(Arc::clone(&log) as Arc<dyn LogSource>)).unwrap();
    log.append(&b"x"[..]);
    h.session.query(0);
    h.host.flush();

    let seen = seen.lock();
    assert!(seen.iter().all(|(thread, _)| thread == "viewer-ui"));
    let kinds: Vec<_> = seen.iter().map(|(_, e)| e.clone()).collect();
    assert_eq!(
        kinds,
        vec![
            SessionEvent::LogChanged {
                old: None,
                new: Some(log.id()),
            },
            SessionEvent::ItemAdded { index: 0 },
            SessionEvent::ItemQueried { index: 0 },
        ]
    );
}

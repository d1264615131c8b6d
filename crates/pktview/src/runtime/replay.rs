//! Replay: feed stdin lines through a session and print decoded output.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::error::ViewerError;
use crate::log::{CaptureLog, LogSource};
use crate::session::ViewerSession;

use super::boot::{protocol_by_name, Viewer};

const SETTLE_POLL: Duration = Duration::from_millis(5);

/// Read one packet per stdin line, decode them with `protocol` and write
/// one JSON object per packet to stdout, followed by a metrics object.
pub async fn replay(viewer: Viewer, protocol: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Viewer { config, host, session } = viewer;

    let protocol = protocol_by_name(protocol)
        .ok_or_else(|| ViewerError::InvalidConfig(format!("unknown protocol '{}'", protocol)))?;
    session.set_protocol(Some(protocol))?;

    let log = Arc::new(CaptureLog::new("stdin"));
    session.set_log(Some(Arc::clone(&log) as Arc<dyn LogSource>))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        log.append(line.into_bytes());
    }
    info!("Read {} packets from stdin", log.len());

    // Batches no larger than the ring keep every printed unit decoded
    let batch = config.eviction.capacity.max(1);
    let mut out = std::io::stdout();
    let total = session.items().len();

    for start in (0..total).step_by(batch) {
        let end = (start + batch).min(total);
        for index in start..end {
            session.query(index);
        }
        settle(&session).await;

        for index in start..end {
            let Some(unit) = session.items().get(index) else {
                continue;
            };
            let line = json!({
                "index": index,
                "captured_at": unit.captured_at(),
                "decoded": unit.is_decoded(),
                "payload": unit.payload().as_deref(),
            });
            writeln!(out, "{}", line)?;
        }
    }

    writeln!(out, "{}", json!({ "metrics": session.metrics() }))?;
    out.flush()?;

    if let Err(e) = session.close() {
        warn!("Session close failed: {}", e);
    }
    host.shutdown();
    Ok(())
}

async fn settle(session: &ViewerSession) {
    while !session.is_settled() {
        tokio::time::sleep(SETTLE_POLL).await;
    }
}

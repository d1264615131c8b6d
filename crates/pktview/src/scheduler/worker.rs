use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::TryRecvError;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::decoder::{Decoder, UndefinedDecoder};
use crate::unit::{Checkout, ParseUnit};

use super::{ExitReason, Shared};

pub(super) async fn run(shared: Arc<Shared>, mut token: CancellationToken) {
    loop {
        let reason = drain(&shared, &token).await;
        match shared.finish(reason, &token) {
            Some(next) => token = next,
            None => break,
        }
    }
}

async fn drain(shared: &Shared, token: &CancellationToken) -> ExitReason {
    let mut empty_polls: u32 = 0;
    let idle_poll = shared.config.idle_poll();

    loop {
        if token.is_cancelled() {
            return ExitReason::Cancelled;
        }

        match shared.rx.try_recv() {
            Ok(unit) => {
                empty_polls = 0;
                process(shared, unit).await;
            }
            Err(TryRecvError::Empty) => {
                tokio::select! {
                    _ = token.cancelled() => return ExitReason::Cancelled,
                    _ = tokio::time::sleep(idle_poll) => {}
                }
                empty_polls = empty_polls.saturating_add(1);
                if empty_polls >= shared.config.idle_polls {
                    return ExitReason::Idle;
                }
            }
            Err(TryRecvError::Disconnected) => return ExitReason::Idle,
        }
    }
}

async fn process(shared: &Shared, unit: Arc<ParseUnit>) {
    let index = unit.index();

    if !shared.context.is_current(&unit.origin()) {
        trace!(index, "Dropping unit orphaned by a protocol or log switch");
        shared.metrics.record_stale();
        unit.unschedule();
        return;
    }

    let (decoder, epoch) = match unit.checkout() {
        Checkout::Decoded => {
            unit.unschedule();
            return;
        }
        Checkout::Pending { decoder, epoch } => (decoder, epoch),
        Checkout::Unbound { epoch } => (bind_decoder(shared, &unit), epoch),
    };

    let data = unit.data().clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut decoder = decoder;
        let result = decoder.decode(&data);
        (decoder, result)
    })
    .await;

    let (decoder, payload) = match outcome {
        Ok((decoder, Ok(payload))) => {
            shared.metrics.record_decoded();
            (decoder, payload)
        }
        Ok((decoder, Err(e))) => {
            warn!(index, error = %e, "Decode failed");
            shared.metrics.record_failed();
            (decoder, None)
        }
        Err(e) => {
            error!(index, "Decoder panicked: {}", panic_message(e));
            shared.metrics.record_panic();
            let terminal: Box<dyn Decoder> = Box::new(UndefinedDecoder::decoded());
            (terminal, None)
        }
    };

    let decoded = decoder.is_decoded();
    let stored = unit.checkin(decoder, payload, epoch);
    if stored && decoded {
        if let Some(hook) = &shared.on_decoded {
            hook(&unit);
        }
    }
    unit.unschedule();

    if !stored {
        debug!(index, "Unit released during decode, result discarded");
    }
}

/// Ask the active protocol for a decoder, falling back to the undefined one.
fn bind_decoder(shared: &Shared, unit: &ParseUnit) -> Box<dyn Decoder> {
    let created = shared.context.protocol().and_then(|protocol| {
        panic::catch_unwind(AssertUnwindSafe(|| protocol.create_decoder(unit))).unwrap_or_else(|_| {
            error!(index = unit.index(), protocol = protocol.name(), "create_decoder panicked");
            shared.metrics.record_panic();
            None
        })
    });

    created.unwrap_or_else(|| {
        debug!(index = unit.index(), "No decoder available, binding undefined decoder");
        shared.metrics.record_undefined();
        Box::new(UndefinedDecoder::new())
    })
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

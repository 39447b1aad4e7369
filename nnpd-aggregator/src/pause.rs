use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Process-wide pause flag, flipped by every `SIGUSR1` delivery. A
/// relaxed atomic read is acceptable: a one-cycle delay in pause
/// propagation is tolerated.
#[derive(Clone, Default)]
pub struct PauseController {
    paused: Arc<AtomicBool>,
}

impl PauseController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Spawn the SIGUSR1 handler task. Runs until the process exits.
    pub fn spawn_signal_handler(&self) -> anyhow::Result<()> {
        let paused = self.paused.clone();
        let mut stream = signal(SignalKind::user_defined1())?;
        tokio::spawn(async move {
            loop {
                if stream.recv().await.is_none() {
                    return;
                }
                let now = !paused.load(Ordering::Relaxed);
                paused.store(now, Ordering::Relaxed);
                info!(paused = now, "SIGUSR1 received, toggled pause state");
            }
        });
        Ok(())
    }
}

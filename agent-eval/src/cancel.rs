//! Cooperative cancellation checked between pipeline stages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result, bail};
use tracing::warn;

use crate::exit_codes;

/// Shared stop flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail if cancellation was requested before `stage` starts.
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            bail!("cancelled before {stage}");
        }
        Ok(())
    }
}

/// Cancel `token` on the first Ctrl-C; exit on the second.
///
/// The listener runs on its own thread with a current-thread runtime, so the
/// pipeline itself stays synchronous.
pub fn cancel_on_ctrl_c(token: &CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build signal runtime")?;
    let token = token.clone();
    thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async {
                loop {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        warn!(error = %err, "ctrl-c listener unavailable");
                        return;
                    }
                    if token.is_cancelled() {
                        std::process::exit(exit_codes::INTERRUPTED);
                    }
                    warn!("interrupt received; stopping before the next stage");
                    token.cancel();
                }
            });
        })
        .context("spawn ctrl-c listener")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let observer = token.clone();
        observer.check("score").expect("not cancelled yet");

        token.cancel();
        let err = observer.check("score").expect_err("cancelled");
        assert_eq!(err.to_string(), "cancelled before score");
    }

    #[test]
    fn ctrl_c_listener_leaves_token_untouched_until_interrupted() {
        let token = CancelToken::new();
        cancel_on_ctrl_c(&token).expect("install listener");
        cancel_on_ctrl_c(&token).expect("second listener");
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!token.is_cancelled());
        token.check("manifest load").expect("still running");
    }
}

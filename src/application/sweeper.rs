use super::settlement::{SettlementEngine, SettlementOutcome};
use crate::domain::ports::SharedSessionStore;
use crate::error::Result;
use chrono::{DateTime, Duration as Age, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingReport {
    pub settled: usize,
    pub already_settled: usize,
    pub unpaid: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_sessions: usize,
    pub pending: PendingReport,
}

/// Periodic maintenance: ages out stale sessions and polls pending payments.
///
/// Expiring a session never touches its payment; the payment keeps being
/// polled by reference.
pub struct Sweeper {
    sessions: SharedSessionStore,
    engine: SettlementEngine,
    session_ttl: Age,
}

impl Sweeper {
    pub fn new(sessions: SharedSessionStore, engine: SettlementEngine, session_ttl: Age) -> Self {
        Self {
            sessions,
            engine,
            session_ttl,
        }
    }

    pub async fn expire_sessions(&self) -> Result<usize> {
        let cutoff = Utc::now()
            .checked_sub_signed(self.session_ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let removed = self.sessions.expire_before(cutoff).await?;
        if removed > 0 {
            info!(removed, "expired stale sessions");
        }
        Ok(removed)
    }

    /// Tries to settle every pending payment. One failing reference does not
    /// stop the others.
    pub async fn verify_pending(&self) -> Result<PendingReport> {
        let mut report = PendingReport::default();
        for payment in self.engine.pending().await? {
            match self.engine.settle_by_payment(&payment.reference).await {
                Ok(SettlementOutcome::Settled(_)) => report.settled += 1,
                Ok(SettlementOutcome::AlreadySettled) => report.already_settled += 1,
                Ok(SettlementOutcome::NotPaid { .. }) => report.unpaid += 1,
                Err(error) => {
                    warn!(reference = %payment.reference, %error, "pending payment check failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    pub async fn sweep_once(&self) -> Result<SweepReport> {
        Ok(SweepReport {
            expired_sessions: self.expire_sessions().await?,
            pending: self.verify_pending().await?,
        })
    }

    /// Sweeps every `interval` until `shutdown` resolves. A shutdown future that
    /// fails, such as a signal handler that could not be installed, stops the
    /// loop with its error.
    pub async fn run<F>(&self, interval: Duration, shutdown: F) -> Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    return match signal {
                        Ok(()) => {
                            info!("sweeper stopping");
                            Ok(())
                        }
                        Err(err) => {
                            error!(error = %err, "shutdown signal failed, sweeper stopping");
                            Err(err.into())
                        }
                    };
                }
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(report) => info!(
                            expired = report.expired_sessions,
                            settled = report.pending.settled,
                            unpaid = report.pending.unpaid,
                            failed = report.pending.failed,
                            "sweep finished"
                        ),
                        Err(error) => warn!(%error, "sweep failed"),
                    }
                }
            }
        }
    }
}

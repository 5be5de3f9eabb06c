use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    time::Duration,
};

use anyhow::Result;
use futures::FutureExt;
use log::{error, info, warn};
use pretty_duration::pretty_duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::display::LabelFormatter;
use crate::fanout::{self, TargetDirectory};
use crate::quotes::{FetchError, QuoteSnapshot, QuoteSource};

/// How often the loop wakes to check whether an update is due.
pub const TICK_PERIOD: Duration = Duration::from_secs(60);

/// Owned by the scheduling loop. The snapshot and the time it was taken are
/// stored as one pair so neither can be set without the other.
#[derive(Debug, Default)]
pub struct SchedulerState {
    last: Option<(QuoteSnapshot, Instant)>,
    fetch_count: u64,
}

impl SchedulerState {
    pub fn last_snapshot(&self) -> Option<&QuoteSnapshot> {
        self.last.as_ref().map(|(snapshot, _)| snapshot)
    }

    pub fn last_update_at(&self) -> Option<Instant> {
        self.last.as_ref().map(|(_, at)| *at)
    }

    pub fn fetch_count(&self) -> u64 {
        self.fetch_count
    }

    pub fn is_due(&self, now: Instant, interval: Duration) -> bool {
        match self.last_update_at() {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= interval,
        }
    }

    fn record(&mut self, snapshot: QuoteSnapshot, now: Instant) {
        self.last = Some((snapshot, now));
    }
}

#[derive(Debug, PartialEq)]
pub enum TickOutcome {
    NotDue,
    Updated {
        label: String,
        updated: usize,
        total: usize,
    },
    FetchFailed {
        error: FetchError,
        error_label_sent: bool,
    },
    Faulted(String),
}

pub struct Scheduler<Q> {
    source: Q,
    symbol: String,
    formatter: LabelFormatter,
    interval: Duration,
    tick_period: Duration,
    state: SchedulerState,
}

impl<Q: QuoteSource> Scheduler<Q> {
    pub fn new(source: Q, symbol: impl Into<String>, interval: Duration) -> Scheduler<Q> {
        let symbol = symbol.into();
        Scheduler {
            source,
            formatter: LabelFormatter::new(symbol.clone()),
            symbol,
            interval,
            tick_period: TICK_PERIOD,
            state: SchedulerState::default(),
        }
    }

    pub fn with_tick_period(mut self, tick_period: Duration) -> Scheduler<Q> {
        self.tick_period = tick_period;
        self
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Waits for `ready` to hand over the targets, then ticks until
    /// `shutdown` fires. A tick already running is finished first; ticks
    /// missed while it ran are skipped rather than queued.
    pub async fn run<D, R>(mut self, ready: R, shutdown: CancellationToken) -> SchedulerState
    where
        D: TargetDirectory,
        R: Future<Output = Option<D>>,
    {
        let directory = tokio::select! {
            () = shutdown.cancelled() => {
                info!("Shutdown requested before the bot became ready");
                return self.state;
            }
            directory = ready => match directory {
                Some(directory) => directory,
                None => {
                    warn!("Chat client went away before becoming ready, price updates not started");
                    return self.state;
                }
            },
        };

        info!(
            "Started price update task with {} interval",
            pretty_duration(&self.interval, None)
        );
        let mut ticker = tokio::time::interval(self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.on_tick(&directory, Instant::now()).await;
        }
        info!(
            "Price update task stopped after {} fetches",
            self.state.fetch_count
        );
        self.state
    }

    /// One tick: fetch, format and fan out if an update is due. Nothing that
    /// goes wrong in here escapes to the caller.
    ///
    /// `now` is the tick time, taken before the fetch starts; a successful
    /// update records it as `last_update_at`, so the stamp can lead the
    /// fetch's completion by up to the HTTP timeout.
    pub async fn on_tick(&mut self, directory: &dyn TargetDirectory, now: Instant) -> TickOutcome {
        if !self.state.is_due(now, self.interval) {
            return TickOutcome::NotDue;
        }
        match AssertUnwindSafe(self.update(directory, now))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("Error in price update task: {:#}", e);
                TickOutcome::Faulted(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Price update task panicked: {}", message);
                TickOutcome::Faulted(message)
            }
        }
    }

    async fn update(&mut self, directory: &dyn TargetDirectory, now: Instant) -> Result<TickOutcome> {
        info!("Fetching updated {} price...", self.symbol);
        self.state.fetch_count += 1;
        match self.source.fetch(&self.symbol).await {
            Ok(snapshot) => {
                let label = self.formatter.format(Some(&snapshot));
                self.state.record(snapshot, now);
                let targets = directory.targets().await?;
                let report = fanout::apply(&label, &targets).await;
                if report.all_failed() {
                    warn!("Failed to update nickname in any guilds");
                } else {
                    info!("Successfully updated price display: {}", label);
                }
                Ok(TickOutcome::Updated {
                    label,
                    updated: report.updated(),
                    total: report.total(),
                })
            }
            Err(error) => {
                error!(
                    "Failed to fetch price data ({}), keeping previous nickname",
                    error
                );
                let error_label_sent = self.state.last_snapshot().is_none();
                if error_label_sent {
                    let label = self.formatter.fetch_error_label();
                    let targets = directory.targets().await?;
                    let report = fanout::apply(&label, &targets).await;
                    if report.all_failed() {
                        warn!("Failed to show {} in any guilds", label);
                    }
                }
                Ok(TickOutcome::FetchFailed {
                    error,
                    error_label_sent,
                })
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::parser::{self, reduce::DayCard};
use crate::sheet::SheetSource;
use crate::window::{self, View};

/// Current local date, time dropped.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Output of one successful ingestion cycle.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub cards: Vec<DayCard>,
    pub loaded_at: DateTime<Local>,
}

impl Snapshot {
    pub fn window(&self, window_days: u32, today: NaiveDate) -> Vec<&DayCard> {
        window::select_window(&self.cards, window_days, today)
    }
}

/// Fetch once, then run the pure pipeline over the complete text.
pub async fn run_cycle(
    source: &dyn SheetSource,
    config: &PipelineConfig,
    today: NaiveDate,
    cancel: &CancellationToken,
) -> Result<Snapshot, PipelineError> {
    let raw = source.fetch(cancel).await?;
    let cards = parser::process_text(&raw, config, today)?;
    info!("Loaded {} day(s) from {}", cards.len(), source.describe());
    Ok(Snapshot {
        cards,
        loaded_at: Local::now(),
    })
}

/// Keeps the last good snapshot across failed cycles.
#[derive(Debug)]
pub struct Dashboard {
    window_days: u32,
    snapshot: Option<Snapshot>,
    last_error: Option<PipelineError>,
}

impl Dashboard {
    pub fn new(window_days: u32) -> Self {
        Self {
            window_days,
            snapshot: None,
            last_error: None,
        }
    }

    pub fn apply(&mut self, outcome: Result<Snapshot, PipelineError>) {
        match outcome {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                self.last_error = None;
            }
            Err(PipelineError::Cancelled) => debug!("cycle cancelled, keeping previous cards"),
            Err(e) => {
                warn!("Cycle failed: {}", e);
                self.last_error = Some(e);
            }
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn view(&self, today: NaiveDate) -> View<'_> {
        match (&self.snapshot, &self.last_error) {
            (None, Some(e)) => View::Failed(e),
            (None, None) => View::Loading,
            (Some(snapshot), stale) => {
                let cards = snapshot.window(self.window_days, today);
                if cards.is_empty() {
                    View::NoQualifyingDay
                } else {
                    View::Cards {
                        cards,
                        stale: stale.as_ref(),
                    }
                }
            }
        }
    }
}

/// Run a cycle on every tick until `shutdown`. A tick that arrives while a
/// retrieval is still outstanding cancels it and starts over.
pub async fn watch<F>(
    source: &dyn SheetSource,
    config: &PipelineConfig,
    every: Duration,
    shutdown: CancellationToken,
    mut on_update: F,
) -> Dashboard
where
    F: FnMut(&Dashboard),
{
    let mut dashboard = Dashboard::new(config.window_days);
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        let token = shutdown.child_token();
        let cycle = run_cycle(source, config, today(), &token);
        tokio::pin!(cycle);

        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return dashboard,
            r = &mut cycle => Some(r),
            _ = ticker.tick() => {
                token.cancel();
                warn!(
                    "Retrieval from {} still running at next tick, superseding",
                    source.describe()
                );
                None
            }
        };

        if let Some(outcome) = outcome {
            dashboard.apply(outcome);
            on_update(&dashboard);
            tokio::select! {
                _ = shutdown.cancelled() => return dashboard,
                _ = ticker.tick() => {}
            }
        }
    }
}

//! Concurrent batch ingestion across a ticker list.
//!
//! The coordinator fans a ticker list out to the provider under a
//! bounded concurrency width, normalizes each fetched frame, and fans
//! the results back into one combined dataset. One ticker's failure
//! never aborts the batch; the batch as a whole fails only when every
//! ticker failed or produced no rows.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::IngestConfig;
use crate::normalize::normalize_bars;
use crate::provider::{DailyBarProvider, DailyBarsRequest};
use crate::retry::RetryPolicy;
use crate::throttle::FetchGate;
use crate::{Bar, DateRange, Ticker};

/// Batch-level ingestion failure.
///
/// Per-ticker reports ride along so callers can still render the tally
/// when nothing was usable.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("all {} tickers failed or returned no data", .reports.len())]
    NoUsableData { reports: Vec<TickerReport> },
}

/// Outcome recorded for each ticker in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum TickerOutcome {
    /// Rows fetched and normalized.
    Loaded { rows: usize },
    /// Provider had no rows for the window. Distinct from failure.
    NoData,
    /// Fetch failed after any retries.
    Failed { reason: String },
    /// Deadline passed before this ticker was dispatched.
    Skipped,
}

impl TickerOutcome {
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// One ticker's entry in the batch tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerReport {
    pub ticker: Ticker,
    pub outcome: TickerOutcome,
}

/// Fan-in result of one ingestion batch: concatenated canonical rows
/// plus the per-ticker tally.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedDataset {
    pub bars: Vec<Bar>,
    pub reports: Vec<TickerReport>,
}

impl CombinedDataset {
    pub fn row_count(&self) -> usize {
        self.bars.len()
    }

    pub fn loaded_tickers(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| report.outcome.is_loaded())
            .count()
    }
}

struct TaskResult {
    index: usize,
    outcome: TickerOutcome,
    bars: Vec<Bar>,
}

/// Bounded fan-out/fan-in scheduler for per-ticker fetches.
pub struct IngestCoordinator {
    provider: Arc<dyn DailyBarProvider>,
    config: IngestConfig,
    gate: FetchGate,
}

impl IngestCoordinator {
    pub fn new(provider: Arc<dyn DailyBarProvider>, config: IngestConfig) -> Self {
        let gate = FetchGate::new(
            config.quota_window,
            config.quota_limit,
            config.throttle_wait,
        );
        Self {
            provider,
            config,
            gate,
        }
    }

    /// Fetch and normalize every ticker over the window.
    ///
    /// Rows for one ticker stay in fetch order; across tickers, rows are
    /// concatenated in input-list order. Tickers that fail or produce no
    /// rows are excluded from the dataset and recorded in the tally.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::NoUsableData`] only when no ticker
    /// contributed any rows.
    pub async fn ingest_all(
        &self,
        tickers: &[Ticker],
        range: DateRange,
    ) -> Result<CombinedDataset, IngestError> {
        let semaphore = Arc::new(Semaphore::new(self.config.fetch_width.max(1)));
        let deadline = self.config.deadline.map(|limit| Instant::now() + limit);

        let mut join_set: JoinSet<TaskResult> = JoinSet::new();
        for (index, ticker) in tickers.iter().enumerate() {
            join_set.spawn(fetch_one(
                index,
                ticker.clone(),
                range,
                Arc::clone(&self.provider),
                Arc::clone(&semaphore),
                self.gate.clone(),
                self.config.retry.clone(),
                deadline,
            ));
        }

        let mut outcomes: Vec<Option<TickerOutcome>> = vec![None; tickers.len()];
        let mut rows: Vec<Vec<Bar>> = vec![Vec::new(); tickers.len()];
        while let Some(joined) = join_set.join_next().await {
            let Ok(result) = joined else {
                // A panicked task is recorded below as an aborted fetch.
                continue;
            };
            outcomes[result.index] = Some(result.outcome);
            rows[result.index] = result.bars;
        }

        let reports: Vec<TickerReport> = tickers
            .iter()
            .zip(outcomes)
            .map(|(ticker, outcome)| TickerReport {
                ticker: ticker.clone(),
                outcome: outcome.unwrap_or(TickerOutcome::Failed {
                    reason: String::from("fetch task aborted"),
                }),
            })
            .collect();

        if !reports.iter().any(|report| report.outcome.is_loaded()) {
            return Err(IngestError::NoUsableData { reports });
        }

        Ok(CombinedDataset {
            bars: rows.into_iter().flatten().collect(),
            reports,
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn fetch_one(
    index: usize,
    ticker: Ticker,
    range: DateRange,
    provider: Arc<dyn DailyBarProvider>,
    semaphore: Arc<Semaphore>,
    gate: FetchGate,
    retry: RetryPolicy,
    deadline: Option<Instant>,
) -> TaskResult {
    let done = |outcome: TickerOutcome, bars: Vec<Bar>| TaskResult {
        index,
        outcome,
        bars,
    };

    let Ok(_permit) = semaphore.acquire_owned().await else {
        return done(
            TickerOutcome::Failed {
                reason: String::from("scheduler closed"),
            },
            Vec::new(),
        );
    };

    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            return done(TickerOutcome::Skipped, Vec::new());
        }
    }

    let mut attempt: u32 = 0;
    loop {
        gate.wait_ready().await;

        let request = DailyBarsRequest::new(ticker.clone(), range);
        match provider.daily_bars(request).await {
            Ok(table) => {
                if table.is_empty() {
                    return done(TickerOutcome::NoData, Vec::new());
                }
                return match normalize_bars(&table, &ticker) {
                    Ok(bars) if bars.is_empty() => done(TickerOutcome::NoData, Vec::new()),
                    Ok(bars) => {
                        let rows = bars.len();
                        done(TickerOutcome::Loaded { rows }, bars)
                    }
                    Err(schema_error) => done(
                        TickerOutcome::Failed {
                            reason: schema_error.to_string(),
                        },
                        Vec::new(),
                    ),
                };
            }
            Err(error) => {
                let may_retry = retry.enabled && error.retryable() && attempt < retry.max_retries;
                if !may_retry {
                    return done(
                        TickerOutcome::Failed {
                            reason: error.to_string(),
                        },
                        Vec::new(),
                    );
                }
                tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
        }
    }
}

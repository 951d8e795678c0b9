//! Contract tests for the daily bar provider seam.
//!
//! Every [`DailyBarProvider`] the coordinator can be handed must honor
//! the same observable contract: an empty window is `Ok` with an empty
//! frame, frames are shaped so normalization can find the identity
//! columns, and repeated calls over the same window agree.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use tickvault_core::{
    normalize_bars, ChartApiProvider, DailyBarProvider, DailyBarsRequest, DateRange, FetchError,
    RawCell, RawLabel, RawTable, Ticker, TradingDate,
};

/// Fixed-frame provider standing in for any custom upstream.
struct FixtureProvider {
    rows: Vec<(i64, f64)>,
}

impl DailyBarProvider for FixtureProvider {
    fn daily_bars<'a>(
        &'a self,
        req: DailyBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            let _ = req;
            let mut table = RawTable::new(vec![
                RawLabel::single("Date"),
                RawLabel::single("Close"),
            ]);
            for (epoch, close) in &self.rows {
                table
                    .push_row(vec![RawCell::Int(*epoch), RawCell::Float(*close)])
                    .map_err(|e| FetchError::internal(e.to_string()))?;
            }
            Ok(table)
        })
    }
}

struct ProviderCase {
    name: &'static str,
    source: Arc<dyn DailyBarProvider>,
}

fn provider_cases() -> Vec<ProviderCase> {
    vec![
        ProviderCase {
            name: "chart-api-offline",
            source: Arc::new(ChartApiProvider::default()),
        },
        ProviderCase {
            name: "fixture",
            source: Arc::new(FixtureProvider {
                // 2024-01-02 and 2024-01-03 at midnight UTC
                rows: vec![(1_704_153_600, 185.64), (1_704_240_000, 184.25)],
            }),
        },
    ]
}

fn request(symbol: &str, start: &str, end: &str) -> DailyBarsRequest {
    let ticker = Ticker::parse(symbol).expect("valid ticker");
    let range = DateRange::new(
        TradingDate::parse(start).expect("valid date"),
        TradingDate::parse(end).expect("valid date"),
    )
    .expect("valid range");
    DailyBarsRequest::new(ticker, range)
}

#[test]
fn frames_carry_identity_columns_for_all_providers() {
    for case in provider_cases() {
        let table = block_on(case.source.daily_bars(request("AAPL", "2024-01-02", "2024-01-03")))
            .unwrap_or_else(|error| panic!("provider '{}' failed: {error}", case.name));

        let primaries: Vec<&str> = table
            .labels()
            .iter()
            .map(|label| label.flatten())
            .collect();
        assert!(primaries.contains(&"Date"), "provider '{}': Date label", case.name);
        assert!(primaries.contains(&"Close"), "provider '{}': Close label", case.name);
    }
}

#[test]
fn frames_normalize_into_window_ordered_bars_for_all_providers() {
    let ticker = Ticker::parse("AAPL").expect("valid ticker");

    for case in provider_cases() {
        let table = block_on(case.source.daily_bars(request("AAPL", "2024-01-02", "2024-01-03")))
            .unwrap_or_else(|error| panic!("provider '{}' failed: {error}", case.name));

        let bars = normalize_bars(&table, &ticker)
            .unwrap_or_else(|error| panic!("provider '{}' normalize failed: {error}", case.name));
        assert!(!bars.is_empty(), "provider '{}': rows expected", case.name);

        let dates: Vec<_> = bars.iter().map(|bar| bar.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted, "provider '{}': date order", case.name);
        assert!(
            bars.iter().all(|bar| bar.ticker == ticker),
            "provider '{}': ticker attribution",
            case.name
        );
    }
}

#[test]
fn repeated_calls_over_one_window_agree_for_all_providers() {
    for case in provider_cases() {
        let first = block_on(case.source.daily_bars(request("MSFT", "2024-02-05", "2024-02-09")))
            .unwrap_or_else(|error| panic!("provider '{}' failed: {error}", case.name));
        let second = block_on(case.source.daily_bars(request("MSFT", "2024-02-05", "2024-02-09")))
            .unwrap_or_else(|error| panic!("provider '{}' failed: {error}", case.name));
        assert_eq!(first, second, "provider '{}': determinism", case.name);
    }
}

#[test]
fn an_empty_window_is_ok_not_an_error() {
    // The offline provider spells "no rows" with the reserved suffix.
    let provider = ChartApiProvider::default();
    let table = block_on(provider.daily_bars(request("ZZZZNOPE", "2024-01-02", "2024-01-05")))
        .expect("empty frame is Ok");
    assert!(table.is_empty());
    assert!(!table.labels().is_empty(), "labels survive an empty frame");
}

#[test]
fn provider_failures_carry_a_retry_classification() {
    let provider = ChartApiProvider::default();
    let err = block_on(provider.daily_bars(request("ZZZZFAIL", "2024-01-02", "2024-01-05")))
        .expect_err("reserved failure spelling");
    // Synthetic internal failures must not be retried by the coordinator.
    assert!(!err.retryable());
}

fn block_on<F>(future: F) -> F::Output
where
    F: Future,
{
    let waker = noop_waker();
    let mut context = Context::from_waker(&waker);
    let mut future = std::pin::pin!(future);

    loop {
        match future.as_mut().poll(&mut context) {
            Poll::Ready(output) => return output,
            Poll::Pending => std::thread::yield_now(),
        }
    }
}

fn noop_waker() -> Waker {
    // SAFETY: The vtable functions never dereference the data pointer and are no-op operations.
    unsafe { Waker::from_raw(noop_raw_waker()) }
}

fn noop_raw_waker() -> RawWaker {
    RawWaker::new(std::ptr::null(), &NOOP_RAW_WAKER_VTABLE)
}

unsafe fn noop_raw_waker_clone(_: *const ()) -> RawWaker {
    noop_raw_waker()
}

unsafe fn noop_raw_waker_wake(_: *const ()) {}

unsafe fn noop_raw_waker_wake_by_ref(_: *const ()) {}

unsafe fn noop_raw_waker_drop(_: *const ()) {}

static NOOP_RAW_WAKER_VTABLE: RawWakerVTable = RawWakerVTable::new(
    noop_raw_waker_clone,
    noop_raw_waker_wake,
    noop_raw_waker_wake_by_ref,
    noop_raw_waker_drop,
);

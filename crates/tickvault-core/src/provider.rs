//! Daily bar provider seam and its chart-API implementation.
//!
//! [`DailyBarProvider`] is the single upstream boundary: given a ticker
//! and an inclusive date window it yields that ticker's raw daily frame,
//! or a typed [`FetchError`]. An empty frame is a valid outcome meaning
//! the provider has no rows for the window; it is never an error here.
//!
//! [`ChartApiProvider`] talks to the public chart endpoint when built
//! with a real transport. Under a mock transport it synthesizes a
//! deterministic frame per ticker instead, so offline runs and tests see
//! stable data. Two spellings are reserved for exercising failure paths
//! offline: tickers ending in `NOPE` synthesize an empty frame, tickers
//! ending in `FAIL` synthesize a provider failure.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use time::Weekday;

use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient, ReqwestHttpClient};
use crate::raw::{RawCell, RawLabel, RawTable};
use crate::{DateRange, Ticker, TradingDate};

const SECONDS_PER_DAY: i64 = 86_400;

/// Fetch-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    Internal,
}

/// Structured fetch error carried back to the ingestion coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
    retryable: bool,
}

impl FetchError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Unavailable => "fetch.unavailable",
            FetchErrorKind::RateLimited => "fetch.rate_limited",
            FetchErrorKind::InvalidRequest => "fetch.invalid_request",
            FetchErrorKind::Internal => "fetch.internal",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

/// Request payload for one ticker's daily series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyBarsRequest {
    pub ticker: Ticker,
    pub range: DateRange,
}

impl DailyBarsRequest {
    pub fn new(ticker: Ticker, range: DateRange) -> Self {
        Self { ticker, range }
    }
}

/// Upstream boundary for daily series retrieval.
///
/// Implementations must be `Send + Sync`; the coordinator shares one
/// provider across all fetch tasks.
pub trait DailyBarProvider: Send + Sync {
    /// Fetch the raw daily frame for one ticker over an inclusive window.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failures, rate limiting, and
    /// malformed payloads. A window with no rows is `Ok` with an empty
    /// frame, not an error.
    fn daily_bars<'a>(
        &'a self,
        req: DailyBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FetchError>> + Send + 'a>>;
}

/// Chart-endpoint provider with a deterministic offline mode.
pub struct ChartApiProvider {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
    use_real_api: bool,
}

impl Default for ChartApiProvider {
    fn default() -> Self {
        Self::with_http_client(Arc::new(NoopHttpClient))
    }
}

impl ChartApiProvider {
    /// Provider backed by a real HTTP transport.
    pub fn live() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            base_url: String::from("https://query1.finance.yahoo.com"),
            timeout_ms: 10_000,
            use_real_api,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_real(&self, req: &DailyBarsRequest) -> Result<RawTable, FetchError> {
        let period1 = epoch_day_start(req.range.start);
        let period2 = epoch_day_start(req.range.end) + SECONDS_PER_DAY;
        let endpoint = format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url,
            urlencoding::encode(req.ticker.as_str()),
            period1,
            period2
        );

        let request = HttpRequest::get(&endpoint)
            .with_header("accept", "application/json")
            .with_timeout_ms(self.timeout_ms);

        let response = self.http_client.execute(request).await.map_err(|e| {
            if e.retryable() {
                FetchError::unavailable(format!("chart transport error: {}", e.message()))
            } else {
                FetchError::internal(format!("chart transport error: {}", e.message()))
            }
        })?;

        if response.status == 429 {
            return Err(FetchError::rate_limited("chart endpoint rate limit hit"));
        }
        if !response.is_success() {
            return Err(FetchError::unavailable(format!(
                "chart endpoint returned status {}",
                response.status
            )));
        }

        let chart: ChartResponse = serde_json::from_str(&response.body)
            .map_err(|e| FetchError::internal(format!("failed to parse chart payload: {e}")))?;

        // An API-level error or an absent series is how the endpoint
        // spells "no rows for this symbol"; both map to an empty frame.
        let mut table = RawTable::new(bar_frame_labels(&req.ticker));
        if chart.chart.error.is_some() {
            return Ok(table);
        }
        let Some(series) = chart.chart.result.as_ref().and_then(|results| results.first()) else {
            return Ok(table);
        };
        let Some(timestamps) = series.timestamp.as_ref() else {
            return Ok(table);
        };
        let Some(quote) = series.indicators.quote.first() else {
            return Ok(table);
        };

        for (index, ts) in timestamps.iter().enumerate() {
            let cells = vec![
                RawCell::Int(*ts),
                float_cell(&quote.open, index),
                float_cell(&quote.high, index),
                float_cell(&quote.low, index),
                float_cell(&quote.close, index),
                int_cell(&quote.volume, index),
            ];
            table
                .push_row(cells)
                .map_err(|e| FetchError::internal(e.to_string()))?;
        }

        Ok(table)
    }

    async fn fetch_offline(&self, req: &DailyBarsRequest) -> Result<RawTable, FetchError> {
        // The mock transport still sees one request, so tests can record
        // calls and inject transport failures.
        let endpoint = format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencoding::encode(req.ticker.as_str())
        );
        let probe = HttpRequest::get(&endpoint).with_timeout_ms(self.timeout_ms);
        self.http_client
            .execute(probe)
            .await
            .map_err(|e| FetchError::unavailable(format!("chart transport error: {}", e.message())))?;

        let symbol = req.ticker.as_str();
        let mut table = RawTable::new(bar_frame_labels(&req.ticker));
        if symbol.ends_with("NOPE") {
            return Ok(table);
        }
        if symbol.ends_with("FAIL") {
            return Err(FetchError::internal("synthetic provider failure"));
        }

        let seed = ticker_seed(&req.ticker);
        let mut current = req.range.start.into_inner();
        let end = req.range.end.into_inner();
        let mut index: u64 = 0;

        while current <= end {
            if !matches!(current.weekday(), Weekday::Saturday | Weekday::Sunday) {
                let base = 90.0 + ((seed + index) % 350) as f64 / 10.0;
                let cells = vec![
                    RawCell::Int(epoch_day_start(TradingDate::from_date(current))),
                    RawCell::Float(base),
                    RawCell::Float(base + 1.20),
                    RawCell::Float(base - 0.80),
                    RawCell::Float(base + 0.30),
                    RawCell::Int(20_000 + (index as i64) * 25),
                ];
                table
                    .push_row(cells)
                    .map_err(|e| FetchError::internal(e.to_string()))?;
                index += 1;
            }

            match current.next_day() {
                Some(next) => current = next,
                None => break,
            }
        }

        Ok(table)
    }
}

impl DailyBarProvider for ChartApiProvider {
    fn daily_bars<'a>(
        &'a self,
        req: DailyBarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable, FetchError>> + Send + 'a>> {
        Box::pin(async move {
            if self.use_real_api {
                self.fetch_real(&req).await
            } else {
                self.fetch_offline(&req).await
            }
        })
    }
}

/// Frame labels mirroring the provider's two-level header shape: price
/// fields carry the ticker as a secondary label, the date column does
/// not.
fn bar_frame_labels(ticker: &Ticker) -> Vec<RawLabel> {
    vec![
        RawLabel::nested("Date", ""),
        RawLabel::nested("Open", ticker.as_str()),
        RawLabel::nested("High", ticker.as_str()),
        RawLabel::nested("Low", ticker.as_str()),
        RawLabel::nested("Close", ticker.as_str()),
        RawLabel::nested("Volume", ticker.as_str()),
    ]
}

fn float_cell(values: &[Option<f64>], index: usize) -> RawCell {
    match values.get(index).copied().flatten() {
        Some(value) => RawCell::Float(value),
        None => RawCell::Null,
    }
}

fn int_cell(values: &[Option<i64>], index: usize) -> RawCell {
    match values.get(index).copied().flatten() {
        Some(value) => RawCell::Int(value),
        None => RawCell::Null,
    }
}

fn epoch_day_start(date: TradingDate) -> i64 {
    date.into_inner().midnight().assume_utc().unix_timestamp()
}

fn ticker_seed(ticker: &Ticker) -> u64 {
    ticker.as_str().bytes().fold(0_u64, |acc, byte| {
        acc.wrapping_mul(33).wrapping_add(byte as u64)
    })
}

// Chart endpoint response structures
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartSeries>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartSeries {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse};
    use crate::normalize::normalize_bars;
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    /// Canned transport that claims to be real so the chart-parsing path
    /// runs against a fixed payload.
    #[derive(Debug)]
    struct CannedHttpClient {
        response: Result<HttpResponse, HttpError>,
    }

    impl HttpClient for CannedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            let _ = request;
            let response = self.response.clone();
            Box::pin(async move { response })
        }
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
    fn offline_mode_synthesizes_weekday_rows() {
        let provider = ChartApiProvider::default();
        let req = request("AAPL", "2024-01-01", "2024-01-07");

        let table = block_on(provider.daily_bars(req)).expect("fetch should succeed");
        assert_eq!(table.row_count(), 5);

        let ticker = Ticker::parse("AAPL").expect("valid ticker");
        let bars = normalize_bars(&table, &ticker).expect("must normalize");
        assert_eq!(bars[0].date.format_iso(), "2024-01-01");
        assert_eq!(bars[4].date.format_iso(), "2024-01-05");
    }

    #[test]
    fn offline_mode_is_deterministic_per_ticker() {
        let provider = ChartApiProvider::default();
        let first = block_on(provider.daily_bars(request("MSFT", "2024-02-05", "2024-02-09")))
            .expect("fetch should succeed");
        let second = block_on(provider.daily_bars(request("MSFT", "2024-02-05", "2024-02-09")))
            .expect("fetch should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn reserved_nope_spelling_returns_empty_frame() {
        let provider = ChartApiProvider::default();
        let table = block_on(provider.daily_bars(request("ZZZZNOPE", "2024-01-02", "2024-01-05")))
            .expect("fetch should succeed");
        assert!(table.is_empty());
    }

    #[test]
    fn reserved_fail_spelling_returns_fetch_error() {
        let provider = ChartApiProvider::default();
        let err = block_on(provider.daily_bars(request("ZZZZFAIL", "2024-01-02", "2024-01-05")))
            .expect_err("fetch should fail");
        assert_eq!(err.kind(), FetchErrorKind::Internal);
        assert!(!err.retryable());
    }

    #[test]
    fn real_mode_parses_chart_payload() {
        let body = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704153600, 1704240000],
                    "indicators": {
                        "quote": [{
                            "open": [187.15, null],
                            "high": [188.44, 189.0],
                            "low": [183.89, 184.2],
                            "close": [185.64, 184.25],
                            "volume": [82488700, null]
                        }]
                    }
                }],
                "error": null
            }
        }"#;
        let client = CannedHttpClient {
            response: Ok(HttpResponse::ok_json(body)),
        };
        let provider = ChartApiProvider::with_http_client(Arc::new(client));

        let table = block_on(provider.daily_bars(request("AAPL", "2024-01-02", "2024-01-03")))
            .expect("fetch should succeed");
        assert_eq!(table.row_count(), 2);

        let ticker = Ticker::parse("AAPL").expect("valid ticker");
        let bars = normalize_bars(&table, &ticker).expect("must normalize");
        assert_eq!(bars[0].open, Some(187.15));
        assert_eq!(bars[0].volume, Some(82_488_700));
        assert_eq!(bars[1].open, None);
        assert_eq!(bars[1].volume, None);
    }

    #[test]
    fn chart_api_error_payload_is_no_data() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found"}}}"#;
        let client = CannedHttpClient {
            response: Ok(HttpResponse::ok_json(body)),
        };
        let provider = ChartApiProvider::with_http_client(Arc::new(client));

        let table = block_on(provider.daily_bars(request("GONE", "2024-01-02", "2024-01-03")))
            .expect("fetch should succeed");
        assert!(table.is_empty());
    }

    #[test]
    fn status_429_maps_to_rate_limited() {
        let client = CannedHttpClient {
            response: Ok(HttpResponse {
                status: 429,
                body: String::new(),
            }),
        };
        let provider = ChartApiProvider::with_http_client(Arc::new(client));

        let err = block_on(provider.daily_bars(request("AAPL", "2024-01-02", "2024-01-03")))
            .expect_err("fetch should fail");
        assert_eq!(err.kind(), FetchErrorKind::RateLimited);
        assert!(err.retryable());
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
}

//! Behavior-driven tests for point-in-time analytics
//!
//! These tests verify WHAT a user learns from delta and ratio questions
//! over stored holdings: boundary selection, classification, and the
//! guarded failure modes.

use tempfile::tempdir;
use tickvault_tests::{bar, holding, open_temp_warehouse, Warehouse, WarehouseError};
use tickvault_warehouse::{quantity_delta, DeltaAction};

/// IVV-style history: AAPL disclosed on three dates, MSFT on two.
fn seed_holdings(warehouse: &Warehouse) {
    warehouse
        .append_holdings(
            "IVV",
            &[
                holding("2024-01-05", "AAPL", Some(100.0), Some(18_500.0)),
                holding("2024-02-05", "AAPL", Some(130.0), Some(24_300.0)),
                holding("2024-03-05", "AAPL", Some(120.0), Some(22_900.0)),
                holding("2024-01-05", "MSFT", Some(40.0), Some(16_100.0)),
                holding("2024-03-05", "MSFT", Some(40.0), Some(16_600.0)),
            ],
        )
        .expect("seed holdings");
}

// =============================================================================
// Analytics: Ranked Window Pairs
// =============================================================================

#[test]
fn delta_uses_the_earliest_and_latest_dates_inside_the_window() {
    // Given: Three AAPL disclosure dates
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp_warehouse(&temp);
    seed_holdings(&warehouse);

    // When: The user asks for the delta over the full window
    let pair = warehouse
        .extract_holding_pair("IVV", "AAPL", "2024-01-01", "2024-03-31")
        .expect("pair should resolve");
    let delta = quantity_delta(&pair).expect("delta should compute");

    // Then: The middle disclosure never influences the boundaries
    assert_eq!(delta.start_date, "2024-01-05");
    assert_eq!(delta.end_date, "2024-03-05");
    assert_eq!(delta.delta, 20.0);
    assert_eq!(delta.action, DeltaAction::Bought);
}

#[test]
fn narrowing_the_window_moves_the_boundaries() {
    // Given: The same three-date history
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp_warehouse(&temp);
    seed_holdings(&warehouse);

    // When: The window excludes the first disclosure
    let pair = warehouse
        .extract_holding_pair("IVV", "AAPL", "2024-02-01", "2024-03-31")
        .expect("pair should resolve");
    let delta = quantity_delta(&pair).expect("delta should compute");

    // Then: The delta is computed from the remaining two dates
    assert_eq!(delta.start_quantity, 130.0);
    assert_eq!(delta.end_quantity, 120.0);
    assert_eq!(delta.action, DeltaAction::Sold);
}

#[test]
fn unchanged_quantity_classifies_as_no_change() {
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp_warehouse(&temp);
    seed_holdings(&warehouse);

    let pair = warehouse
        .extract_holding_pair("IVV", "MSFT", "2024-01-01", "2024-03-31")
        .expect("pair should resolve");
    let delta = quantity_delta(&pair).expect("delta should compute");

    assert_eq!(delta.delta, 0.0);
    assert_eq!(delta.action, DeltaAction::NoChange);
    assert_eq!(delta.action.as_str(), "No Change");
}

#[test]
fn a_single_disclosure_date_is_insufficient() {
    // Given: A window holding exactly one AAPL date
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp_warehouse(&temp);
    seed_holdings(&warehouse);

    // When: The user asks for a delta over it
    let err = warehouse
        .extract_holding_pair("IVV", "AAPL", "2024-02-01", "2024-02-28")
        .expect_err("must fail");

    // Then: The typed failure names the window
    assert!(matches!(err, WarehouseError::InsufficientData { .. }));
}

#[test]
fn bar_pairs_follow_the_same_ranking_rules() {
    // Given: A short bar history
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp_warehouse(&temp);
    warehouse
        .append_bars(&[
            bar("2024-01-02", "AAPL", 185.6),
            bar("2024-01-03", "AAPL", 184.2),
            bar("2024-01-04", "AAPL", 181.9),
        ])
        .expect("append should succeed");

    // When: The user extracts a bar pair over the window
    let pair = warehouse
        .extract_bar_pair("AAPL", "2024-01-01", "2024-01-31")
        .expect("pair should resolve");

    // Then: Boundaries and the distinct-date count reflect the window
    assert_eq!(pair.start.date, "2024-01-02");
    assert_eq!(pair.end.date, "2024-01-04");
    assert_eq!(pair.distinct_dates, 3);
}

#[test]
fn duplicate_rows_on_a_boundary_date_resolve_to_the_first_stored_row() {
    // Given: Two physical rows sharing the end date
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp_warehouse(&temp);
    warehouse
        .append_holdings(
            "IVV",
            &[
                holding("2024-01-05", "AAPL", Some(100.0), Some(18_500.0)),
                holding("2024-03-05", "AAPL", Some(120.0), Some(22_900.0)),
                holding("2024-03-05", "AAPL", Some(999.0), Some(1.0)),
            ],
        )
        .expect("seed holdings");

    // When: The pair is extracted
    let pair = warehouse
        .extract_holding_pair("IVV", "AAPL", "2024-01-01", "2024-03-31")
        .expect("pair should resolve");

    // Then: The first stored row for the tied date wins
    assert_eq!(pair.end.quantity, Some(120.0));
    assert_eq!(pair.distinct_dates, 2);
}

// =============================================================================
// Analytics: Delta Listing
// =============================================================================

#[test]
fn delta_all_lists_tickers_by_end_market_value_descending() {
    // Given: Two tickers with two dates each
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp_warehouse(&temp);
    seed_holdings(&warehouse);

    // When: The user lists every delta
    let rows = warehouse
        .delta_all("IVV", "2024-01-01", "2024-03-31", 100)
        .expect("listing should succeed");

    // Then: AAPL's larger end market value puts it first
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].ticker, "AAPL");
    assert_eq!(rows[0].delta, Some(20.0));
    assert_eq!(rows[1].ticker, "MSFT");
    assert_eq!(rows[1].delta, Some(0.0));
}

#[test]
fn delta_all_honors_the_limit_and_omits_single_date_tickers() {
    // Given: One ticker with a single date in the window
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp_warehouse(&temp);
    seed_holdings(&warehouse);
    warehouse
        .append_holdings(
            "IVV",
            &[holding("2024-02-05", "NVDA", Some(10.0), Some(7_000.0))],
        )
        .expect("append should succeed");

    // When: The user lists with a limit of one
    let rows = warehouse
        .delta_all("IVV", "2024-01-01", "2024-03-31", 1)
        .expect("listing should succeed");

    // Then: Only the top ticker is returned and NVDA never appears
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].ticker, "AAPL");
}

// =============================================================================
// Analytics: Guarded Ratios
// =============================================================================

#[test]
fn product_delta_ratio_matches_hand_computed_terms() {
    // Given: Three disclosure dates with known unit prices
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp_warehouse(&temp);
    seed_holdings(&warehouse);

    // When: The user computes sum(product) / sum(delta)
    let ratio = warehouse
        .product_over_delta_ratio("IVV", "AAPL", "2024-01-01", "2024-03-31")
        .expect("ratio should compute");

    // Then: Terms derive from quantity - lag(quantity) and
    // market_value / quantity per date
    // date 2: delta 30, unit price 24300/130; date 3: delta -10, unit price 22900/120
    let expected_numerator = (24_300.0 / 130.0) * 30.0 + (22_900.0 / 120.0) * (-10.0);
    assert!((ratio.numerator - expected_numerator).abs() < 1e-9);
    assert_eq!(ratio.denominator, 20.0);
    assert!((ratio.ratio - expected_numerator / 20.0).abs() < 1e-9);
}

#[test]
fn zero_quantity_movement_never_divides() {
    // Given: A ticker whose quantity never changed
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp_warehouse(&temp);
    seed_holdings(&warehouse);

    // When: The user computes either ratio for it
    let product_delta = warehouse
        .product_over_delta_ratio("IVV", "MSFT", "2024-01-01", "2024-03-31")
        .expect_err("must fail");
    let weighted = warehouse
        .weighted_product_ratio("IVV", "MSFT", "2024-01-01", "2024-03-31")
        .expect_err("must fail");

    // Then: Both fail with the typed guard instead of Inf/NaN
    assert!(matches!(product_delta, WarehouseError::ZeroDenominator { .. }));
    assert!(matches!(weighted, WarehouseError::ZeroDenominator { .. }));
}

#[test]
fn weighted_ratio_uses_the_boundary_quantity_movement() {
    // Given: The three-date AAPL history
    let temp = tempdir().expect("tempdir");
    let warehouse = open_temp_warehouse(&temp);
    seed_holdings(&warehouse);

    // When: The user computes the weighted variant
    let ratio = warehouse
        .weighted_product_ratio("IVV", "AAPL", "2024-01-01", "2024-03-31")
        .expect("ratio should compute");

    // Then: The denominator is end quantity minus start quantity
    assert_eq!(ratio.denominator, 20.0);
    assert_eq!(ratio.start_date, "2024-01-05");
    assert_eq!(ratio.end_date, "2024-03-05");
}

// Whole-run behaviour: writes, notifications, state and failure handling

use super::*;
use shelf_watcher::models::{Column, ObservedValue, Previous};
use shelf_watcher::scheduler::{TickOutcome, check_tick};

const A: &str = "https://shop-a.test/goods/1";
const B: &str = "https://shop-b.test/goods/2";

fn cells(harness: &TestHarness, url: &str) -> (String, String) {
    harness.store.cells(url).unwrap()
}

#[tokio::test]
async fn test_first_run_writes_and_notifies() {
    let pages = ScriptedPageFactory::new();
    pages.set(A, Script::Price(12000));
    pages.set(B, Script::SoldOut);
    let harness = TestHarness::new(get_test_config(), pages, &[A, B]);
    assert_eq!(harness.reload().await, 2);

    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.changed, 1);
    assert_eq!(summary.errored, 0);

    let (price, updated_at) = cells(&harness, A);
    assert_eq!(price, "12000");
    assert!(!updated_at.is_empty());

    // First sighting of a sold-out page labels the cell without a timestamp.
    assert_eq!(cells(&harness, B), ("품절".to_string(), String::new()));

    let changes = harness.notifier.changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, NotificationKind::PriceChange);
    assert_eq!(changes[0].previous, None);
    assert_eq!(changes[0].current, Some(12000));
    assert_eq!(harness.notifier.channels(), vec![WEBHOOK.to_string()]);
}

#[tokio::test]
async fn test_repeated_run_is_idempotent() {
    let pages = ScriptedPageFactory::new();
    pages.set(A, Script::Price(12000));
    pages.set(B, Script::SoldOut);
    let harness = TestHarness::new(get_test_config(), pages, &[A, B]);
    harness.reload().await;

    harness.engine.run_once().await.unwrap();
    harness.store.clear_writes();
    harness.notifier.clear();

    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.changed, 0);
    assert_eq!(summary.backfilled, 0);
    assert!(harness.store.writes().is_empty());
    assert!(harness.notifier.kinds().is_empty());
}

#[tokio::test]
async fn test_blank_cell_is_backfilled_without_timestamp() {
    let pages = ScriptedPageFactory::new();
    pages.set(A, Script::Price(12000));
    let harness = TestHarness::new(get_test_config(), pages, &[A]);
    harness.reload().await;

    harness.engine.run_once().await.unwrap();
    harness.store.set_price(A, "");
    harness.store.clear_writes();
    harness.notifier.clear();

    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.backfilled, 1);
    assert_eq!(summary.changed, 0);
    let writes = harness.store.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].column, Column::Price);
    assert_eq!(writes[0].value, "12000");
    assert!(harness.notifier.kinds().is_empty());
}

#[tokio::test]
async fn test_sold_out_then_restock() {
    let pages = ScriptedPageFactory::new();
    pages.set(A, Script::Price(12000));
    let harness = TestHarness::new(get_test_config(), pages.clone(), &[A]);
    harness.reload().await;
    harness.engine.run_once().await.unwrap();
    harness.notifier.clear();

    pages.set(A, Script::SoldOut);
    let summary = harness.engine.run_once().await.unwrap();
    assert_eq!(summary.changed, 1);
    assert_eq!(cells(&harness, A).0, "품절");
    let changes = harness.notifier.changes();
    assert_eq!(changes[0].kind, NotificationKind::SoldOut);
    assert_eq!(changes[0].previous, Some(12000));
    harness.notifier.clear();

    pages.set(A, Script::Price(13500));
    harness.engine.run_once().await.unwrap();
    assert_eq!(cells(&harness, A).0, "13500");
    let changes = harness.notifier.changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, NotificationKind::Restock);
    assert_eq!(changes[0].current, Some(13500));
}

#[tokio::test]
async fn test_removed_row_drops_url_from_watch_list() {
    let pages = ScriptedPageFactory::new();
    pages.set(A, Script::Price(12000));
    pages.set(B, Script::Price(20000));
    let harness = TestHarness::new(get_test_config(), pages, &[A, B]);
    harness.reload().await;

    harness.store.remove_url(B);
    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.removed, 1);
    assert_eq!(harness.engine.urls().await, vec![A.to_string()]);
    assert_eq!(harness.engine.state().await.previous(B), Previous::Unknown);
    assert!(harness.store.writes().iter().all(|w| Some(w.row) == harness.store.row_for(A)));
}

#[tokio::test]
async fn test_failed_extraction_changes_nothing() {
    let pages = ScriptedPageFactory::new();
    pages.set(A, Script::Fail);
    let harness = TestHarness::new(get_test_config(), pages, &[A]);
    harness.reload().await;

    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.errored, 1);
    assert!(harness.store.writes().is_empty());
    assert!(harness.notifier.kinds().is_empty());
    assert_eq!(harness.engine.state().await.previous(A), Previous::Unknown);
    assert_eq!(harness.pages.stats().opens(), 2);
}

#[tokio::test]
async fn test_missing_price_is_an_error() {
    let pages = ScriptedPageFactory::new();
    pages.set(A, Script::NoPrice);
    let harness = TestHarness::new(get_test_config(), pages, &[A]);
    harness.reload().await;

    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.errored, 1);
    assert_eq!(cells(&harness, A), (String::new(), String::new()));
}

#[tokio::test]
async fn test_write_failure_keeps_previous_state() {
    let pages = ScriptedPageFactory::new();
    pages.set(A, Script::Price(12000));
    pages.set(B, Script::Price(20000));
    let harness = TestHarness::new(get_test_config(), pages, &[A, B]);
    harness.reload().await;
    harness.store.fail_writes_for(harness.store.row_for(A).unwrap());

    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.write_failures, 1);
    let state = harness.engine.state().await;
    assert_eq!(state.previous(A), Previous::Unknown);
    assert_eq!(state.previous(B), Previous::Known(ObservedValue::Price(20000)));

    // Only the successful row is announced.
    let changes = harness.notifier.changes();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].url, B);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("price_state.json");

    let mut config = get_test_config();
    config.engine.dry_run = true;
    let pages = ScriptedPageFactory::new();
    pages.set(A, Script::Price(12000));
    let harness = TestHarness::with_state(config, pages, &[A], WatchState::load(&state_path));
    harness.reload().await;

    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.changed, 1);
    assert!(harness.store.writes().is_empty());
    assert!(harness.notifier.kinds().is_empty());
    assert!(!state_path.exists());
}

#[tokio::test]
async fn test_state_file_is_saved_after_run() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state").join("price_state.json");

    let pages = ScriptedPageFactory::new();
    pages.set(A, Script::Price(12000));
    pages.set(B, Script::SoldOut);
    let harness = TestHarness::with_state(get_test_config(), pages, &[A, B], WatchState::load(&state_path));
    harness.reload().await;

    harness.engine.run_once().await.unwrap();

    let reloaded = WatchState::load(&state_path);
    assert_eq!(reloaded.previous(A), Previous::Known(ObservedValue::Price(12000)));
    assert_eq!(reloaded.previous(B), Previous::Known(ObservedValue::SoldOut));
}

#[tokio::test]
async fn test_empty_watch_list_skips_run() {
    let harness = TestHarness::new(get_test_config(), ScriptedPageFactory::new(), &[]);
    harness.reload().await;

    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.total, 0);
    assert_eq!(harness.pages.stats().opens(), 0);
}

#[tokio::test]
async fn test_store_read_failure_fails_run() {
    let pages = ScriptedPageFactory::new();
    pages.set(A, Script::Price(12000));
    let harness = TestHarness::new(get_test_config(), pages, &[A]);
    harness.reload().await;
    harness.store.set_fail_reads(true);

    assert!(harness.engine.run_once().await.is_err());
    assert!(harness.store.writes().is_empty());
    assert_eq!(harness.engine.state().await.previous(A), Previous::Unknown);
}

#[tokio::test]
async fn test_reload_announces_list_size() {
    let harness = TestHarness::new(get_test_config(), ScriptedPageFactory::new(), &[A, B, A]);

    assert_eq!(harness.engine.reload_urls().await.unwrap(), 2);
    assert_eq!(harness.notifier.kinds(), vec![NotificationKind::Info]);
}

#[tokio::test]
async fn test_overlapping_tick_is_skipped() {
    let pages = ScriptedPageFactory::with_delay(Duration::from_millis(300));
    pages.set(A, Script::Price(12000));
    let harness = TestHarness::new(get_test_config(), pages, &[A]);
    harness.reload().await;

    let engine = Arc::clone(&harness.engine);
    let running = tokio::spawn(async move { engine.run_once().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(matches!(check_tick(&harness.engine).await, TickOutcome::Skipped));
    assert!(running.await.unwrap().is_ok());
    assert!(matches!(check_tick(&harness.engine).await, TickOutcome::Completed(_)));
}

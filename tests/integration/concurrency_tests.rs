// Admission limits and retry accounting across whole runs

use super::*;

fn urls_on(origin: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{}/goods/{}", origin, i)).collect()
}

fn harness_for(config: AppConfig, pages: ScriptedPageFactory, urls: &[String]) -> TestHarness {
    let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    TestHarness::new(config, pages, &refs)
}

#[tokio::test]
async fn test_retry_runs_exactly_configured_attempts() {
    let mut config = get_test_config();
    config.engine.retry_attempts = 3;
    let url = "https://shop-a.test/goods/1";
    let pages = ScriptedPageFactory::new();
    pages.set(url, Script::Fail);
    let harness = TestHarness::new(config, pages, &[url]);
    harness.reload().await;

    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.errored, 1);
    assert_eq!(harness.pages.stats().opens(), 3);
    assert_eq!(harness.pages.stats().navigations(url), 3);
}

#[tokio::test]
async fn test_retry_stops_at_first_success() {
    let mut config = get_test_config();
    config.engine.retry_attempts = 3;
    let url = "https://shop-a.test/goods/1";
    let pages = ScriptedPageFactory::new();
    pages.set(url, Script::FailThenPrice { failures: 1, price: 9900 });
    let harness = TestHarness::new(config, pages, &[url]);
    harness.reload().await;

    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.errored, 0);
    assert_eq!(harness.pages.stats().opens(), 2);
    assert_eq!(harness.store.cells(url).unwrap().0, "9900");
}

#[tokio::test]
async fn test_global_limit_bounds_active_pages() {
    let urls: Vec<String> = (1..=20).map(|i| format!("https://shop-{}.test/goods/1", i)).collect();
    let pages = ScriptedPageFactory::with_delay(Duration::from_millis(50));
    for url in &urls {
        pages.set(url, Script::Price(10000));
    }
    let harness = harness_for(get_test_config(), pages, &urls);
    harness.reload().await;

    let summary = harness.engine.run_once().await.unwrap();

    assert_eq!(summary.total, 20);
    assert_eq!(summary.errored, 0);
    let stats = harness.pages.stats();
    assert_eq!(stats.opens(), 20);
    assert!(stats.max_active() <= 5, "max active was {}", stats.max_active());
    assert!(stats.max_active() > 1);
}

#[tokio::test]
async fn test_origin_limit_isolates_sites() {
    let mut urls = urls_on("https://shop-a.test", 6);
    urls.extend(urls_on("https://shop-b.test", 6));
    let pages = ScriptedPageFactory::with_delay(Duration::from_millis(50));
    for url in &urls {
        pages.set(url, Script::Price(10000));
    }
    let harness = harness_for(get_test_config(), pages, &urls);
    harness.reload().await;

    harness.engine.run_once().await.unwrap();

    let stats = harness.pages.stats();
    assert!(stats.max_active_for("https://shop-a.test") <= 2);
    assert!(stats.max_active_for("https://shop-b.test") <= 2);
    // A saturated origin does not hold back the other one.
    assert!(stats.max_active() > 2, "max active was {}", stats.max_active());
}

#[tokio::test]
async fn test_slow_origin_does_not_block_fast_one() {
    let mut config = get_test_config();
    config.engine.per_origin_concurrency = 1;
    let urls = vec![
        "https://slow.test/goods/1".to_string(),
        "https://slow.test/goods/2".to_string(),
        "https://slow.test/goods/3".to_string(),
        "https://fast.test/goods/1".to_string(),
    ];
    let pages = ScriptedPageFactory::with_delay(Duration::from_millis(100));
    for url in &urls {
        pages.set(url, Script::Price(10000));
    }
    let harness = harness_for(config, pages, &urls);
    harness.reload().await;

    let started = std::time::Instant::now();
    harness.engine.run_once().await.unwrap();

    let stats = harness.pages.stats();
    assert_eq!(stats.max_active_for("https://slow.test"), 1);
    assert_eq!(stats.max_active_for("https://fast.test"), 1);
    assert_eq!(stats.max_active(), 2);
    assert!(started.elapsed() >= Duration::from_millis(300));
}

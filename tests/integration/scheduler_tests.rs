use super::*;
use sitewatch::config::SchedulerConfig;
use sitewatch::SiteScheduler;
use tokio::time::Instant;

fn scheduler(backend: &ScriptedBackend, notifier: &RecordingNotifier) -> SiteScheduler {
    scheduler_with_delay(backend, notifier, Some(0))
}

fn scheduler_with_delay(
    backend: &ScriptedBackend,
    notifier: &RecordingNotifier,
    round_delay_secs: Option<u64>,
) -> SiteScheduler {
    let config = SchedulerConfig {
        round_delay_secs,
        ..SchedulerConfig::default()
    };
    SiteScheduler::new(Box::new(backend.clone()), Arc::new(notifier.clone()), &config)
}

#[tokio::test]
async fn test_scheduler_retires_watches_and_stops() {
    let backend = ScriptedBackend::new();
    let notifier = RecordingNotifier::new();
    // A fails on its first poll. B and C run out of pages on their second.
    backend.script(&url_for("a"), vec![not_found()]);
    backend.script(&url_for("b"), vec![page("Out of Stock")]);
    backend.script(&url_for("c"), vec![page("In Stock")]);

    let mut scheduler = scheduler(&backend, &notifier);
    for name in ["a", "b", "c"] {
        assert!(scheduler.add_target(stock_target(name)).await);
    }

    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.rounds, 2);
    assert_eq!(stats.polls, 5);
    assert_eq!(stats.retired, 3);
    assert_eq!(stats.triggered, 1);
    assert_eq!(
        backend.calls(),
        vec![url_for("a"), url_for("b"), url_for("c"), url_for("b"), url_for("c")]
    );
    assert!(backend.is_closed());

    // Three failure notices and one trigger notice, each to two recipients.
    let sent = notifier.sent();
    let failures = sent
        .iter()
        .filter(|email| email.subject.starts_with("Error Notification"))
        .count();
    assert_eq!(failures, 6);
    assert_eq!(sent.len(), 8);
    assert_eq!(stats.notifications_sent, 8);
    assert_eq!(stats.notifications_failed, 0);
}

#[tokio::test]
async fn test_navigation_failures_do_not_retire_watch() {
    let backend = ScriptedBackend::new();
    let notifier = RecordingNotifier::new();
    backend.script(
        &url_for("a"),
        vec![offline(), page("In Stock"), offline(), page("Out of Stock")],
    );

    let mut scheduler = scheduler(&backend, &notifier);
    scheduler.add_target(stock_target("a")).await;
    let stats = scheduler.run().await.unwrap();

    // Four scripted polls plus the final NotFound.
    assert_eq!(stats.rounds, 5);
    assert_eq!(stats.deferred, 2);
    assert_eq!(stats.triggered, 1);
    assert_eq!(stats.normalized, 1);
    assert_eq!(notifier.count(), 6);
}

#[tokio::test]
async fn test_invalid_test_type_is_reported_and_skipped() {
    let backend = ScriptedBackend::new();
    let notifier = RecordingNotifier::new();
    let mut bad = stock_target("bad");
    bad.condition_kind = "element_contains_text".to_string();

    let mut scheduler = scheduler(&backend, &notifier);
    assert!(!scheduler.add_target(bad).await);
    assert!(scheduler.is_empty());

    let sent = notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].body.contains("unsupported test type 'element_contains_text'"));

    let stats = scheduler.run().await.unwrap();
    assert_eq!(stats.rounds, 0);
    assert!(backend.calls().is_empty());
    assert!(backend.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_sleeps_between_rounds_but_not_after_the_last() {
    let backend = ScriptedBackend::new();
    let notifier = RecordingNotifier::new();
    backend.script(&url_for("a"), vec![page("Out of Stock"), page("Out of Stock")]);

    let mut scheduler = scheduler_with_delay(&backend, &notifier, Some(30));
    scheduler.add_target(stock_target("a")).await;

    let started = Instant::now();
    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.rounds, 3);
    assert_eq!(started.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_delay_falls_back_to_shortest_reload_time() {
    let backend = ScriptedBackend::new();
    let notifier = RecordingNotifier::new();
    backend.script(&url_for("a"), vec![page("Out of Stock")]);
    backend.script(&url_for("b"), vec![page("Out of Stock")]);

    let mut slow = stock_target("a");
    slow.poll_interval = Duration::from_secs(600);
    let mut fast = stock_target("b");
    fast.poll_interval = Duration::from_secs(45);

    let mut scheduler = scheduler_with_delay(&backend, &notifier, None);
    scheduler.add_target(slow).await;
    scheduler.add_target(fast).await;

    let started = Instant::now();
    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.rounds, 2);
    assert_eq!(started.elapsed(), Duration::from_secs(45));
}

#[tokio::test(start_paused = true)]
async fn test_single_round_run_does_not_sleep() {
    let backend = ScriptedBackend::new();
    let notifier = RecordingNotifier::new();
    backend.script(&url_for("a"), vec![not_found()]);

    let mut scheduler = scheduler_with_delay(&backend, &notifier, Some(30));
    scheduler.add_target(stock_target("a")).await;

    let started = Instant::now();
    let stats = scheduler.run().await.unwrap();

    assert_eq!(stats.rounds, 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

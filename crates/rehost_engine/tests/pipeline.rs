use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use rehost_core::RehostConfig;
use rehost_engine::{
    FailureKind, FetchError, Fetcher, MemoryNotifier, MemoryStore, MessageStore, Rehoster,
    RunOutcome, TempDownload,
};

/// Canned fetcher: URLs mapped to a body succeed, everything else fails with
/// a network error. Records every attempted URL.
struct MockFetcher {
    bodies: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl MockFetcher {
    fn new(bodies: &[(&str, &str)]) -> Self {
        Self {
            bodies: bodies
                .iter()
                .map(|(url, body)| (url.to_string(), body.as_bytes().to_vec()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<TempDownload, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.bodies.get(url) {
            Some(body) => {
                use std::io::Write;
                let mut file = tempfile::NamedTempFile::new().unwrap();
                file.write_all(body).unwrap();
                Ok(TempDownload {
                    file,
                    byte_len: body.len() as u64,
                    content_type: Some("image/png".to_string()),
                    final_url: url.to_string(),
                })
            }
            None => Err(FetchError {
                kind: FailureKind::Network,
                message: "connection refused".to_string(),
            }),
        }
    }
}

fn test_config() -> RehostConfig {
    RehostConfig {
        base_url: "http://chat.test".to_string(),
        local_bases: vec!["http://chat.test".to_string()],
        retry_backoff: Duration::from_millis(1),
        ..RehostConfig::default()
    }
}

struct Pipeline {
    store: Arc<MemoryStore>,
    notifier: Arc<MemoryNotifier>,
    fetcher: Arc<MockFetcher>,
    rehoster: Arc<Rehoster>,
}

fn pipeline(config: RehostConfig, fetcher: MockFetcher) -> Pipeline {
    rehost_logging::initialize_for_tests();
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let fetcher = Arc::new(fetcher);
    let rehoster = Arc::new(Rehoster::new(
        config,
        fetcher.clone(),
        store.clone(),
        notifier.clone(),
    ));
    Pipeline {
        store,
        notifier,
        fetcher,
        rehoster,
    }
}

#[tokio::test]
async fn hotlinked_image_is_downloaded_rewritten_and_announced() {
    let p = pipeline(
        test_config(),
        MockFetcher::new(&[("http://cdn.example.com/a.png", "png-bytes")]),
    );
    p.store.add_channel(10);
    p.store
        .insert_message(1, 10, 7, "![img](http://cdn.example.com/a.png)");

    let outcome = p.rehoster.run(1).await.unwrap();

    assert_eq!(outcome, RunOutcome::Updated);
    let message = p.store.message(1).unwrap();
    assert_eq!(message.raw, "![img](/uploads/1/a.png)");
    assert!(message.cooked.contains(r#"<img src="/uploads/1/a.png">"#));
    assert_eq!(p.store.associations(1), vec![1]);
    assert_eq!(p.notifier.updates(), vec![(10, 1)]);
    let assets = p.store.assets();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].origin_url, "http://cdn.example.com/a.png");
}

#[tokio::test]
async fn two_spellings_of_one_url_download_once() {
    let p = pipeline(
        test_config(),
        MockFetcher::new(&[
            ("http://cdn.example.com/a.png", "png-bytes"),
            ("https://cdn.example.com/a.png", "png-bytes"),
        ]),
    );
    p.store.add_channel(10);
    p.store.insert_message(
        1,
        10,
        7,
        "![one](http://cdn.example.com/a.png)\n![two](https://cdn.example.com/a.png)",
    );

    let outcome = p.rehoster.run(1).await.unwrap();

    assert_eq!(outcome, RunOutcome::Updated);
    assert_eq!(p.fetcher.calls().len(), 1);
    assert_eq!(p.store.assets().len(), 1);
    assert_eq!(p.store.associations(1), vec![1]);
    let message = p.store.message(1).unwrap();
    assert_eq!(
        message.raw,
        "![one](/uploads/1/a.png)\n![two](/uploads/1/a.png)"
    );
}

#[tokio::test]
async fn messages_without_eligible_references_are_untouched() {
    let p = pipeline(test_config(), MockFetcher::new(&[]));
    p.store.add_channel(10);
    p.store.insert_message(1, 10, 7, "just words, no images");

    let outcome = p.rehoster.run(1).await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingDownloaded);
    assert_eq!(p.store.message(1).unwrap().raw, "just words, no images");
    assert!(p.fetcher.calls().is_empty());
    assert!(p.store.associations(1).is_empty());
    assert!(p.notifier.updates().is_empty());
}

#[tokio::test]
async fn own_base_urls_are_never_fetched() {
    let p = pipeline(test_config(), MockFetcher::new(&[]));
    p.store.add_channel(10);
    p.store
        .insert_message(1, 10, 7, "![img](http://chat.test/uploads/9/old.png)");

    let outcome = p.rehoster.run(1).await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingDownloaded);
    assert!(p.fetcher.calls().is_empty());
}

#[tokio::test]
async fn oversized_downloads_are_discarded() {
    let mut config = test_config();
    config.max_bytes = 8;
    let p = pipeline(
        config,
        MockFetcher::new(&[("http://cdn.example.com/big.png", "way more than eight bytes")]),
    );
    p.store.add_channel(10);
    p.store
        .insert_message(1, 10, 7, "![img](http://cdn.example.com/big.png)");

    let outcome = p.rehoster.run(1).await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingDownloaded);
    assert_eq!(p.fetcher.calls().len(), 1, "size rejection is not retried");
    assert_eq!(
        p.store.message(1).unwrap().raw,
        "![img](http://cdn.example.com/big.png)"
    );
    assert!(p.store.assets().is_empty());
}

#[tokio::test]
async fn permanent_fetch_failure_leaves_the_message_byte_identical() {
    let p = pipeline(test_config(), MockFetcher::new(&[]));
    p.store.add_channel(10);
    p.store
        .insert_message(1, 10, 7, "![img](http://cdn.example.com/missing.png)");

    let outcome = p.rehoster.run(1).await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingDownloaded);
    assert_eq!(p.fetcher.calls().len(), 3, "three attempts then give up");
    assert_eq!(
        p.store.message(1).unwrap().raw,
        "![img](http://cdn.example.com/missing.png)"
    );
    assert!(p.store.assets().is_empty());
    assert!(p.notifier.updates().is_empty());
}

#[tokio::test]
async fn one_failing_candidate_does_not_abort_the_run() {
    let p = pipeline(
        test_config(),
        MockFetcher::new(&[("http://cdn.example.com/good.png", "png-bytes")]),
    );
    p.store.add_channel(10);
    p.store.insert_message(
        1,
        10,
        7,
        "![good](http://cdn.example.com/good.png)\n![bad](http://cdn.example.com/gone.png)",
    );

    let outcome = p.rehoster.run(1).await.unwrap();

    assert_eq!(outcome, RunOutcome::Updated);
    let message = p.store.message(1).unwrap();
    assert_eq!(
        message.raw,
        "![good](/uploads/1/good.png)\n![bad](http://cdn.example.com/gone.png)"
    );
}

#[tokio::test]
async fn scheme_relative_sources_expand_with_the_preferred_scheme() {
    let p = pipeline(
        test_config(),
        MockFetcher::new(&[("http://cdn.example.com/a.png", "png-bytes")]),
    );
    p.store.add_channel(10);
    p.store
        .insert_message(1, 10, 7, "![img](//cdn.example.com/a.png)");

    let outcome = p.rehoster.run(1).await.unwrap();

    assert_eq!(outcome, RunOutcome::Updated);
    assert_eq!(p.fetcher.calls(), vec!["http://cdn.example.com/a.png"]);
    assert_eq!(p.store.message(1).unwrap().raw, "![img](/uploads/1/a.png)");
}

#[tokio::test]
async fn second_run_is_a_noop_and_does_not_reannounce() {
    let p = pipeline(
        test_config(),
        MockFetcher::new(&[("http://cdn.example.com/a.png", "png-bytes")]),
    );
    p.store.add_channel(10);
    p.store
        .insert_message(1, 10, 7, "![img](http://cdn.example.com/a.png)");

    assert_eq!(p.rehoster.run(1).await.unwrap(), RunOutcome::Updated);
    assert_eq!(
        p.rehoster.run(1).await.unwrap(),
        RunOutcome::NothingDownloaded
    );

    assert_eq!(p.fetcher.calls().len(), 1);
    assert_eq!(p.store.associations(1), vec![1]);
    assert_eq!(p.notifier.updates().len(), 1);
}

#[tokio::test]
async fn concurrent_triggers_for_one_message_never_double_associate() {
    let p = pipeline(
        test_config(),
        MockFetcher::new(&[("http://cdn.example.com/a.png", "png-bytes")]),
    );
    p.store.add_channel(10);
    p.store
        .insert_message(1, 10, 7, "![img](http://cdn.example.com/a.png)");

    let first = p.rehoster.clone();
    let second = p.rehoster.clone();
    let (a, b) = tokio::join!(first.run(1), second.run(1));
    a.unwrap();
    b.unwrap();

    assert_eq!(p.store.associations(1), vec![1]);
    assert_eq!(p.store.assets().len(), 1);
    assert_eq!(p.notifier.updates().len(), 1);
}

#[tokio::test]
async fn disabled_flags_short_circuit() {
    let mut config = test_config();
    config.enabled = false;
    let p = pipeline(config, MockFetcher::new(&[]));
    p.store.add_channel(10);
    p.store
        .insert_message(1, 10, 7, "![img](http://cdn.example.com/a.png)");

    assert_eq!(p.rehoster.run(1).await.unwrap(), RunOutcome::Disabled);
    assert!(p.fetcher.calls().is_empty());
}

#[tokio::test]
async fn missing_entities_exit_silently() {
    let p = pipeline(test_config(), MockFetcher::new(&[]));

    assert_eq!(p.rehoster.run(99).await.unwrap(), RunOutcome::MessageMissing);

    // Message whose channel was never created.
    p.store
        .insert_message(2, 42, 7, "![img](http://cdn.example.com/a.png)");
    assert_eq!(p.rehoster.run(2).await.unwrap(), RunOutcome::ChannelMissing);

    p.store.add_channel(10);
    p.store
        .insert_message(3, 10, 7, "![img](http://cdn.example.com/a.png)");
    p.store.trash_message(3);
    assert_eq!(p.rehoster.run(3).await.unwrap(), RunOutcome::MessageTrashed);

    assert!(p.fetcher.calls().is_empty());
}

#[tokio::test]
async fn empty_download_fails_validation_and_creates_nothing() {
    let p = pipeline(
        test_config(),
        MockFetcher::new(&[("http://cdn.example.com/empty.png", "")]),
    );
    p.store.add_channel(10);
    p.store
        .insert_message(1, 10, 7, "![img](http://cdn.example.com/empty.png)");

    let outcome = p.rehoster.run(1).await.unwrap();

    assert_eq!(outcome, RunOutcome::NothingDownloaded);
    assert!(p.store.assets().is_empty());
    assert!(p.store.associations(1).is_empty());
}

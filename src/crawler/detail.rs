//! Detail phase: fetch, parse and persist every discovered listing
//!
//! Work flows through three stages:
//! - Fetch workers pull URLs from a shared queue through the polite fetcher,
//!   following redirects to the listing's current page
//! - Parsed pages are produced on the blocking pool, at most `parse-workers` at once
//! - Results go to the single [`StoreWriter`](crate::crawler::StoreWriter)

use crate::crawler::fetcher::{fetch_following, FetchResult, PageFetcher, MAX_REDIRECTS};
use crate::crawler::writer::WriterHandle;
use crate::extract::{extract_detail, DetailPage};
use crate::state::{PropertyAction, ScrapeOutcome, SkipReason};
use crate::storage::{Record, StorageResult, Store};
use crate::TrawlError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Worker counts for the detail phase
#[derive(Debug, Clone, Copy)]
pub struct DetailSettings {
    pub fetch_workers: usize,
    pub parse_workers: usize,
}

/// A fetched detail page waiting for a parser
struct FetchedPage {
    url: String,
    result: FetchResult,
}

/// Writes one parsed detail page in a single transaction
///
/// The property is inserted when its `(name, zipcode)` key is new and fully
/// overwritten otherwise. Every unit is inserted; units are never updated.
/// On error nothing from this page stays in the store.
pub fn persist_detail<S>(store: &mut S, page: &DetailPage) -> StorageResult<ScrapeOutcome>
where
    S: Store + ?Sized,
{
    store.begin()?;
    let written = write_detail(&mut *store, page).and_then(|outcome| {
        store.commit()?;
        Ok(outcome)
    });

    if written.is_err() {
        if let Err(e) = store.rollback() {
            tracing::warn!("Rollback for {} failed: {}", page.property.source_url, e);
        }
    }
    written
}

fn write_detail<S>(store: &mut S, page: &DetailPage) -> StorageResult<ScrapeOutcome>
where
    S: Store + ?Sized,
{
    let property = &page.property;

    let action = if store.exists(&property.property_name, &property.zipcode)? {
        store.update(property)?;
        PropertyAction::Updated
    } else {
        store.insert(Record::Property(property))?;
        PropertyAction::Inserted
    };

    for unit in &page.units {
        store.insert(Record::Unit(unit))?;
    }

    Ok(ScrapeOutcome::Persisted {
        property: action,
        units_inserted: page.units.len() as u64,
        units_discarded: page.units_discarded,
    })
}

/// Extracts a detail page, turning a panic in the extractor into a skip
pub fn parse_detail(url: &str, body: &str, city: &str) -> Result<DetailPage, SkipReason> {
    match catch_unwind(AssertUnwindSafe(|| extract_detail(body, url, city))) {
        Ok(Ok(page)) => Ok(page),
        Ok(Err(e)) => Err(SkipReason::Extraction(e)),
        Err(payload) => Err(SkipReason::Panicked(panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs the detail phase over `urls`
///
/// Cancellation is checked before each URL is taken from the queue. Pages
/// already fetched when the token fires are still parsed and written.
///
/// # Returns
///
/// * `Ok(())` - Every taken URL reached the writer
/// * `Err(TrawlError::WriterGone)` - The writer stopped early
/// * `Err(TrawlError::Task)` - A worker task failed to join
pub async fn scrape_details<F>(
    fetcher: Arc<F>,
    urls: Vec<String>,
    city: &str,
    settings: DetailSettings,
    writer: WriterHandle,
    cancel: CancellationToken,
) -> Result<(), TrawlError>
where
    F: PageFetcher + ?Sized + 'static,
{
    let worker_count = settings.fetch_workers.clamp(1, urls.len().max(1));
    let queue = Arc::new(Mutex::new(urls.into_iter()));
    let (page_tx, mut page_rx) = mpsc::unbounded_channel::<FetchedPage>();

    let mut fetchers = JoinSet::new();
    for _ in 0..worker_count {
        let queue = Arc::clone(&queue);
        let fetcher = Arc::clone(&fetcher);
        let page_tx = page_tx.clone();
        let cancel = cancel.clone();

        fetchers.spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let next = queue.lock().unwrap_or_else(PoisonError::into_inner).next();
                let Some(url) = next else { break };

                let result = fetch_following(fetcher.as_ref(), &url, MAX_REDIRECTS).await;
                if page_tx.send(FetchedPage { url, result }).is_err() {
                    break;
                }
            }
        });
    }
    drop(page_tx);

    let parse_permits = Arc::new(Semaphore::new(settings.parse_workers.max(1)));
    let city: Arc<str> = Arc::from(city);
    let mut parsers: JoinSet<Result<(), TrawlError>> = JoinSet::new();

    while let Some(FetchedPage { url, result }) = page_rx.recv().await {
        let status = result.status();
        let Some(body) = result.into_document() else {
            writer.submit(url, Err(SkipReason::FetchFailed { status }))?;
            continue;
        };

        let permit = Arc::clone(&parse_permits)
            .acquire_owned()
            .await
            .map_err(|e| TrawlError::Task(e.to_string()))?;
        let writer = writer.clone();
        let city = Arc::clone(&city);

        parsers.spawn_blocking(move || {
            let _permit = permit;
            let parsed = parse_detail(&url, &body, &city);
            writer.submit(url, parsed)
        });

        // Surface writer failures without waiting for the queue to drain
        while let Some(joined) = parsers.try_join_next() {
            joined.map_err(|e| TrawlError::Task(e.to_string()))??;
        }
    }

    while let Some(joined) = parsers.join_next().await {
        joined.map_err(|e| TrawlError::Task(e.to_string()))??;
    }
    while let Some(joined) = fetchers.join_next().await {
        joined.map_err(|e| TrawlError::Task(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::testing::ScriptedFetcher;
    use crate::crawler::writer::StoreWriter;
    use crate::extract::ExtractError;
    use crate::state::RunSummary;
    use crate::storage::SqliteStorage;

    const DETAIL: &str = include_str!("../../tests/fixtures/detail_page.html");

    const SETTINGS: DetailSettings = DetailSettings {
        fetch_workers: 2,
        parse_workers: 2,
    };

    #[test]
    fn test_upsert_is_idempotent() {
        let mut store = SqliteStorage::new_in_memory().unwrap();
        let page = parse_detail("https://example.com/lakeshore/", DETAIL, "Chicago").unwrap();
        assert_eq!(page.units.len(), 1);

        let first = persist_detail(&mut store, &page).unwrap();
        let second = persist_detail(&mut store, &page).unwrap();

        assert_eq!(
            first,
            ScrapeOutcome::Persisted {
                property: PropertyAction::Inserted,
                units_inserted: 1,
                units_discarded: 1
            }
        );
        assert_eq!(
            second,
            ScrapeOutcome::Persisted {
                property: PropertyAction::Updated,
                units_inserted: 1,
                units_discarded: 1
            }
        );
        assert_eq!(store.count_properties(None).unwrap(), 1);
        assert_eq!(store.count_units(None).unwrap(), 2);
    }

    #[test]
    fn test_property_without_units_is_stored() {
        let mut store = SqliteStorage::new_in_memory().unwrap();
        let html = r#"
            <h1 class="propertyName">Quiet Place</h1>
            <div class="propertyAddressContainer">
                <span class="stateZipContainer"><span>IL</span><span>60601</span></span>
            </div>
        "#;
        let page = parse_detail("https://example.com/quiet/", html, "Chicago").unwrap();
        assert!(page.layout.is_none());

        persist_detail(&mut store, &page).unwrap();

        assert_eq!(store.count_properties(None).unwrap(), 1);
        assert_eq!(store.count_units(None).unwrap(), 0);
    }

    #[test]
    fn test_failed_unit_insert_rolls_back_property() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listings.db");
        let mut store = SqliteStorage::new(&path).unwrap();
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_units BEFORE INSERT ON units
                 BEGIN SELECT RAISE(ABORT, 'units rejected'); END;",
            )
            .unwrap();

        let page = parse_detail("https://example.com/lakeshore/", DETAIL, "Chicago").unwrap();
        assert!(persist_detail(&mut store, &page).is_err());

        assert_eq!(store.count_properties(None).unwrap(), 0);
        assert_eq!(store.count_units(None).unwrap(), 0);
        assert!(store.create_run("Chicago", "IL", "hash").is_ok());
    }

    #[test]
    fn test_parse_detail_missing_name() {
        let result = parse_detail("https://example.com/x/", "<html></html>", "Chicago");
        assert_eq!(
            result.unwrap_err(),
            SkipReason::Extraction(ExtractError::MissingPropertyName)
        );
    }

    #[test]
    fn test_panic_message() {
        let payload = catch_unwind(|| panic!("bad markup")).unwrap_err();
        assert_eq!(panic_message(&*payload), "bad markup");

        let payload = catch_unwind(|| panic!("{} blocks", 3)).unwrap_err();
        assert_eq!(panic_message(&*payload), "3 blocks");
    }

    #[tokio::test]
    async fn test_scrape_details_pipeline() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .page("https://example.com/lakeshore/", DETAIL)
                .page("https://example.com/nameless/", "<html><body></body></html>")
                .status("https://example.com/gone/", 500),
        );
        let urls = vec![
            "https://example.com/gone/".to_string(),
            "https://example.com/lakeshore/".to_string(),
            "https://example.com/nameless/".to_string(),
        ];

        let writer = StoreWriter::spawn(
            SqliteStorage::new_in_memory().unwrap(),
            RunSummary::default(),
            CancellationToken::new(),
        );
        scrape_details(
            Arc::clone(&fetcher),
            urls,
            "Chicago",
            SETTINGS,
            writer.handle(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let output = writer.finish().await.unwrap();
        assert_eq!(output.summary.urls_processed, 3);
        assert_eq!(output.summary.properties_inserted, 1);
        assert_eq!(output.summary.units_inserted, 1);
        assert_eq!(output.summary.units_discarded, 1);
        assert_eq!(output.summary.skipped_by_kind.get("fetch_failed"), Some(&1));
        assert_eq!(
            output.summary.skipped_by_kind.get("missing_property_name"),
            Some(&1)
        );
        assert_eq!(fetcher.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_redirected_listing_is_scraped() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .redirect("https://example.com/old-listing/", "/lakeshore-commons/")
                .page("https://example.com/lakeshore-commons/", DETAIL),
        );

        let writer = StoreWriter::spawn(
            SqliteStorage::new_in_memory().unwrap(),
            RunSummary::default(),
            CancellationToken::new(),
        );
        scrape_details(
            Arc::clone(&fetcher),
            vec!["https://example.com/old-listing/".to_string()],
            "Chicago",
            SETTINGS,
            writer.handle(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let output = writer.finish().await.unwrap();
        assert_eq!(output.summary.properties_inserted, 1);
        assert_eq!(output.summary.skipped, 0);
        assert_eq!(fetcher.requests().len(), 2);

        let stored = output
            .store
            .get_property("Lakeshore Commons", "60614")
            .unwrap()
            .unwrap();
        assert_eq!(stored.source_url, "https://example.com/old-listing/");
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fetches_nothing() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let writer = StoreWriter::spawn(
            SqliteStorage::new_in_memory().unwrap(),
            RunSummary::default(),
            CancellationToken::new(),
        );
        scrape_details(
            Arc::clone(&fetcher),
            vec!["https://example.com/a/".to_string()],
            "Chicago",
            SETTINGS,
            writer.handle(),
            cancel,
        )
        .await
        .unwrap();

        let output = writer.finish().await.unwrap();
        assert!(fetcher.requests().is_empty());
        assert_eq!(output.summary.urls_processed, 0);
    }
}

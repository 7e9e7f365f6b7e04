mod common;

use common::{names, MockApi};
use pokedex_tui::enrich::{CancelToken, EnrichOptions};
use pokedex_tui::error::EnrichError;
use pokedex_tui::fetch::{self, FetchState, RefreshJob, RefreshOptions};
use pokedex_tui::models::EnrichedEntry;
use pokedex_tui::sprites::{sprite_path, SpriteCache};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn refresh_options(data_dir: &Path, limit: usize, offset: usize, sprites: bool) -> RefreshOptions {
    RefreshOptions {
        limit,
        offset,
        enrich: EnrichOptions {
            batch_size: 2,
            ..EnrichOptions::default()
        },
        data_dir: data_dir.to_path_buf(),
        fetch_sprites: sprites,
    }
}

#[tokio::test]
async fn refresh_writes_cache_and_sprites() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(MockApi::kanto());
    let options = refresh_options(dir.path(), 3, 0, true);
    let progress = Arc::new(Mutex::new(FetchState::default()));

    let outcome = fetch::refresh(api, &options, Some(progress.clone()), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.available, 4);
    assert_eq!(names(&outcome.report.entries), vec!["bulbasaur", "charmander", "squirtle"]);
    assert_eq!(outcome.sprites.downloaded, 3);

    let cached = fetch::load_cache(&options.cache_path()).unwrap();
    assert_eq!(cached, outcome.report.entries);

    let st = progress.lock().unwrap().clone();
    assert!(!st.in_progress);
    assert_eq!((st.fetched, st.total), (3, 3));

    let record = cached[0].record().unwrap();
    let path = sprite_path(&options.sprite_dir(), record).unwrap();
    assert!(path.exists());
    let cache = SpriteCache::new();
    let rows = cache.pixels(record.id, &path, 2, 2).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].len(), 2);
}

#[tokio::test]
async fn second_refresh_skips_sprites_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(MockApi::kanto());
    let options = refresh_options(dir.path(), 2, 0, true);

    fetch::refresh(api.clone(), &options, None, &CancelToken::new()).await.unwrap();
    let again = fetch::refresh(api, &options, None, &CancelToken::new()).await.unwrap();

    assert_eq!(again.sprites.downloaded, 0);
    assert_eq!(again.sprites.skipped, 2);
}

#[tokio::test]
async fn offset_pages_through_the_listing() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(MockApi::kanto());
    let options = refresh_options(dir.path(), 2, 2, false);

    let outcome = fetch::refresh(api, &options, None, &CancelToken::new()).await.unwrap();

    assert_eq!(names(&outcome.report.entries), vec!["squirtle", "pidgey"]);
    assert!(!options.sprite_dir().exists());
}

#[tokio::test]
async fn failed_entries_are_cached_too() {
    let dir = tempfile::tempdir().unwrap();
    let mut api = MockApi::kanto();
    api.failing_details.insert("charmander".into());
    let options = refresh_options(dir.path(), 4, 0, false);

    fetch::refresh(Arc::new(api), &options, None, &CancelToken::new()).await.unwrap();

    let cached = fetch::load_cache(&options.cache_path()).unwrap();
    assert_eq!(cached.len(), 4);
    assert!(matches!(&cached[1], EnrichedEntry::Failed { stub, .. } if stub.name == "charmander"));
}

#[tokio::test]
async fn cancelled_refresh_leaves_cache_alone() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(MockApi::kanto());
    let options = refresh_options(dir.path(), 4, 0, false);
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = fetch::refresh(api, &options, None, &cancel).await;

    assert!(matches!(result, Err(EnrichError::Cancelled)));
    assert!(!options.cache_path().exists());
}

#[tokio::test(start_paused = true)]
async fn cancelled_refresh_does_not_clobber_its_successor() {
    let dir = tempfile::tempdir().unwrap();
    let mut api = MockApi::kanto();
    api.list_delay = Duration::from_millis(300);
    api.default_delay = Duration::from_millis(100);
    let api = Arc::new(api);
    let options = refresh_options(dir.path(), 4, 0, false);
    let progress = Arc::new(Mutex::new(FetchState::default()));

    let cancel_a = CancelToken::new();
    let a = tokio::spawn({
        let (api, options, progress, cancel) =
            (api.clone(), options.clone(), progress.clone(), cancel_a.clone());
        async move { fetch::refresh(api, &options, Some(progress), &cancel).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel_a.cancel();
    let b = tokio::spawn({
        let (api, options, progress) = (api.clone(), options.clone(), progress.clone());
        async move { fetch::refresh(api, &options, Some(progress), &CancelToken::new()).await }
    });

    assert!(matches!(a.await.unwrap(), Err(EnrichError::Cancelled)));
    // A gave up while still listing; B is listing now and owns the gauge
    assert!(progress.lock().unwrap().in_progress);

    let outcome = b.await.unwrap().unwrap();
    assert_eq!(outcome.report.entries.len(), 4);
    let st = progress.lock().unwrap().clone();
    assert!(!st.in_progress);
    assert_eq!((st.fetched, st.total), (4, 4));
}

#[tokio::test(start_paused = true)]
async fn cancelled_mid_enrichment_leaves_progress_alone() {
    let dir = tempfile::tempdir().unwrap();
    let mut api = MockApi::kanto();
    api.default_delay = Duration::from_millis(100);
    let api = Arc::new(api);
    let options = refresh_options(dir.path(), 4, 0, false);
    let progress = Arc::new(Mutex::new(FetchState::default()));
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        trigger.cancel();
    });

    let result = fetch::refresh(api, &options, Some(progress.clone()), &cancel).await;

    assert!(matches!(result, Err(EnrichError::Cancelled)));
    let st = progress.lock().unwrap().clone();
    assert!(st.in_progress);
    assert_eq!((st.fetched, st.total), (2, 4));
}

#[tokio::test(start_paused = true)]
async fn each_job_reports_into_its_own_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut api = MockApi::kanto();
    api.list_delay = Duration::from_millis(300);
    let api = Arc::new(api);
    let options = refresh_options(dir.path(), 4, 0, false);

    let first = RefreshJob::spawn(api.clone(), options.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;
    first.cancel();
    let second = RefreshJob::spawn(api, options);
    assert!(!Arc::ptr_eq(&first.progress(), &second.progress()));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(matches!(first.try_take(), Some(Err(EnrichError::Cancelled))));
    assert!(!first.progress().lock().unwrap().in_progress);
    assert!(second.progress().lock().unwrap().in_progress);
    assert!(second.try_take().is_none());

    tokio::time::sleep(Duration::from_secs(1)).await;
    let outcome = second.try_take().unwrap().unwrap();
    assert_eq!(names(&outcome.report.entries), vec!["bulbasaur", "charmander", "squirtle", "pidgey"]);
    assert!(!second.progress().lock().unwrap().in_progress);
    assert!(second.try_take().is_none());
}

#[tokio::test]
async fn interrupted_sprite_download_is_fetched_again() {
    let dir = tempfile::tempdir().unwrap();
    let api = Arc::new(MockApi::kanto());
    let options = refresh_options(dir.path(), 1, 0, true);
    let sprites = options.sprite_dir();
    std::fs::create_dir_all(&sprites).unwrap();
    std::fs::write(sprites.join("1.png.part"), b"\x89PNG trunc").unwrap();

    let outcome = fetch::refresh(api, &options, None, &CancelToken::new()).await.unwrap();

    assert_eq!(outcome.sprites.downloaded, 1);
    let leftovers: Vec<_> = std::fs::read_dir(&sprites)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, vec!["1.png"]);
    assert!(SpriteCache::new().pixels(1, &sprites.join("1.png"), 2, 2).is_some());
}

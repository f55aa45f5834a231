use super::*;
use crate::{
    list_state::{resolve, ListScope},
    test_support::FakeCatalog,
};
use shared::domain::{CategoryId, SortKey};

fn view_over(catalog: FakeCatalog) -> (ProductListView, Arc<FakeCatalog>, broadcast::Receiver<ClientEvent>) {
    let catalog = Arc::new(catalog);
    let (events, rx) = broadcast::channel(64);
    let view = ProductListView::new(catalog.clone(), events);
    (view, catalog, rx)
}

fn titles(products: &[Product]) -> Vec<&str> {
    products.iter().map(|p| p.title.as_str()).collect()
}

#[tokio::test]
async fn refresh_renders_sorted_page() {
    let (view, _catalog, mut rx) = view_over(FakeCatalog::seeded());
    let query = resolve(1, SortKey::LowPrice, &ListScope::default());

    let products = view.refresh(query.clone()).await.expect("refresh").expect("current");
    assert_eq!(titles(&products), vec!["Aux Cable", "Bluetooth Speaker X1"]);

    let rendered = view.snapshot().await.expect("rendered");
    assert_eq!(rendered.generation, 1);
    assert_eq!(rendered.query, query);

    match rx.recv().await.expect("event") {
        ClientEvent::ProductsUpdated { generation, products, .. } => {
            assert_eq!(generation, 1);
            assert_eq!(products.len(), 2);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn refresh_applies_category_scope() {
    let (view, _catalog, _rx) = view_over(FakeCatalog::seeded());
    let query = resolve(
        1,
        SortKey::TitleDesc,
        &ListScope::category(CategoryId::new("laptops")),
    );

    let products = view.refresh(query).await.expect("refresh").expect("current");
    assert_eq!(titles(&products), vec!["Ultrabook 14"]);
}

#[tokio::test]
async fn page_past_the_end_renders_empty_list() {
    let (view, _catalog, _rx) = view_over(FakeCatalog::seeded());
    let products = view
        .refresh(resolve(9, SortKey::Default, &ListScope::default()))
        .await
        .expect("refresh")
        .expect("current");
    assert!(products.is_empty());
}

#[tokio::test]
async fn superseded_response_is_discarded() {
    let (catalog, gate) = FakeCatalog::seeded().gate_page(1);
    let (view, _catalog, _rx) = view_over(catalog);
    let older = resolve(1, SortKey::TitleAsc, &ListScope::default());
    let newer = resolve(2, SortKey::TitleAsc, &ListScope::default());

    let (older_result, newer_result) = tokio::join!(view.refresh(older), async {
        let result = view.refresh(newer.clone()).await;
        gate.notify_one();
        result
    });

    assert!(older_result.expect("older").is_none());
    let newer_products = newer_result.expect("newer").expect("current");
    assert_eq!(titles(&newer_products), vec!["Studio Headphones", "Ultrabook 14"]);

    let rendered = view.snapshot().await.expect("rendered");
    assert_eq!(rendered.query, newer);
    assert_eq!(rendered.generation, 2);
}

#[tokio::test]
async fn spawn_refresh_cancels_in_flight_fetch() {
    let (catalog, _gate) = FakeCatalog::seeded().gate_page(1);
    let (view, catalog, _rx) = view_over(catalog);

    let first = view.spawn_refresh(resolve(1, SortKey::Default, &ListScope::default()));
    tokio::task::yield_now().await;
    let second = view.spawn_refresh(resolve(2, SortKey::Default, &ListScope::default()));

    let second_products = second
        .await
        .expect("join second")
        .expect("refresh")
        .expect("current");
    assert_eq!(second_products.len(), 2);

    let first_outcome = first.await;
    assert!(
        first_outcome.as_ref().is_err_and(|err| err.is_cancelled()),
        "first fetch should be aborted: {first_outcome:?}"
    );
    assert_eq!(view.snapshot().await.expect("rendered").query.page, 2);
    assert_eq!(view.current_generation(), 2);
    assert!(catalog
        .calls()
        .await
        .contains(&"list_products page=2 sort=defaultSort".to_string()));
}

#[tokio::test]
async fn failed_refresh_keeps_previous_render_and_notifies() {
    let mut catalog = FakeCatalog::seeded();
    catalog.failing_pages.insert(2);
    let (view, _catalog, mut rx) = view_over(catalog);

    view.refresh(resolve(1, SortKey::Default, &ListScope::default()))
        .await
        .expect("first page");
    let _ = rx.recv().await;

    let err = view
        .refresh(resolve(2, SortKey::Default, &ListScope::default()))
        .await
        .expect_err("page 2 fails");
    assert!(matches!(err, ClientError::Remote { status: 503, .. }));
    assert_eq!(view.snapshot().await.expect("rendered").query.page, 1);
    assert!(matches!(rx.recv().await, Ok(ClientEvent::Error(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_spawned_refreshes_always_render_the_newest() {
    let runtime = tokio::runtime::Handle::current();
    for _ in 0..300 {
        let (view, _catalog, _rx) = view_over(FakeCatalog::seeded());
        let barrier = std::sync::Barrier::new(2);

        let handles: Vec<_> = std::thread::scope(|scope| {
            let spawned: Vec<_> = [1u32, 2]
                .into_iter()
                .map(|page| {
                    let (view, barrier, runtime) = (&view, &barrier, &runtime);
                    scope.spawn(move || {
                        let _entered = runtime.enter();
                        barrier.wait();
                        view.spawn_refresh(resolve(page, SortKey::Default, &ListScope::default()))
                    })
                })
                .collect();
            spawned
                .into_iter()
                .map(|thread| thread.join().expect("spawning thread"))
                .collect()
        });

        let mut rendered = 0;
        for handle in handles {
            if let Ok(Ok(Some(_))) = handle.await {
                rendered += 1;
            }
        }
        assert!(rendered >= 1, "the newest overlapping refresh must render");
        let snapshot = view.snapshot().await.expect("newest refresh rendered");
        assert_eq!(snapshot.generation, view.current_generation());
    }
}



use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use gerobak::catalog::{Material, Product};
use gerobak::core::{Debouncer, EventBus, EventHandler};
use gerobak::deletion::confirmation_prompt;
use gerobak::store::{HttpAssetStore, MemoryAssetStore, MemoryRecordStore};
use gerobak::{
    AssetStore, DeletionController, GerobakConfig, Notifier, RecordStore, ToastQueue,
    DEFAULT_CONFIG_PATH,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("gerobak=info".parse()?))
        .init();

    let config = if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() {
        GerobakConfig::load(DEFAULT_CONFIG_PATH)?
    } else {
        GerobakConfig::from_env()
    };
    info!("Grace period {}ms", config.grace_period_ms);

    let assets: Arc<dyn AssetStore> = match &config.asset_delete_endpoint {
        Some(endpoint) => Arc::new(HttpAssetStore::new(
            endpoint.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )?),
        None => Arc::new(MemoryAssetStore::new()),
    };

    let events = EventBus::new();
    let audit: EventHandler = Arc::new(|event| {
        info!("[audit] {} {}", event.event_type, event.payload);
    });
    events.register_all(audit).await;

    let reindex = Debouncer::new(
        "reindex",
        config.reindex_quiet(),
        Arc::new(|| async { info!("Derived index regenerated") }.boxed()),
    );

    let store = Arc::new(MemoryRecordStore::<Product>::new());
    let toasts = ToastQueue::new();
    let controller = DeletionController::builder(
        store.clone() as Arc<dyn RecordStore<Product>>,
        assets,
        Arc::new(toasts.clone()) as Arc<dyn Notifier>,
    )
    .config(config.deletion())
    .events(events)
    .reindex(reindex.clone())
    .build();

    let image = |name: &str| format!("https://res.cloudinary.com/gerobak/image/upload/v1/products/{}.jpg", name);

    // Undo run: the product comes back under a new id, images stay.
    let cart = controller
        .create(Product::new("Cart A", Material::Wood, 3_500_000).with_images([image("img1"), image("img2")]))
        .await?;
    let prompt = confirmation_prompt(&cart);
    controller.request_deletion(&cart, &prompt).await?;
    info!("Listed after delete: {}", controller.mirror().len().await);

    tokio::time::sleep(config.deletion().grace_period / 2).await;
    if let Some(notice) = toasts.latest_with_action() {
        toasts.click_undo(notice).await;
    }
    info!("Listed after undo: {}", controller.mirror().len().await);

    // Finalize run: no undo, images are cleaned up after the grace period.
    let cart = controller
        .create(Product::new("Cart B", Material::StainlessSteel, 5_000_000).with_images([image("img3")]))
        .await?;
    let prompt = confirmation_prompt(&cart);
    controller.request_deletion(&cart, &prompt).await?;
    tokio::time::sleep(config.deletion().grace_period + Duration::from_millis(100)).await;

    controller.flush_pending().await;
    reindex.flush().await;

    info!("Done: {:?}", controller.stats());
    Ok(())
}

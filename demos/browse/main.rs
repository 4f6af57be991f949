//! Browse the mock API through the cache
//!
//! Start the mock server first, then:
//! `cargo run --example browse [config.yaml]`
//!
//! Walks a few pages, scrolls ahead, filters, sorts and edits one record,
//! printing what the cache reports along the way.

use anyhow::Result;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;
use userdeck::prelude::*;

fn print_page(label: &str, page: &PageSlice) {
    println!(
        "📄 {} page {}/{} ({} rows, total {})",
        label,
        page.page + 1,
        page.meta.total_pages.max(1),
        page.rows.len(),
        page.meta.total_count
    );
    for user in page.rows.iter().take(3) {
        println!(
            "   #{:<6} {} {} ({}), {} @ {}",
            user.id, user.name, user.surname, user.age, user.department, user.company
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => DeckConfig::from_yaml_file(&path)?,
        None => DeckConfig::default(),
    };

    let source = HttpUserSource::from_settings(&config.source)?;
    let controller = PaginationController::builder(Arc::new(source))
        .settings(&config.cache)
        .build()?;

    // Print merges as they happen
    let mut events = controller.events().stream();
    let listener = tokio::spawn(async move {
        while let Some(Ok(envelope)) = events.next().await {
            if let CacheEvent::PageMerged {
                page,
                loaded,
                total_count,
                ..
            } = envelope.event
            {
                println!("   ↳ merged source page {} ({}/{})", page, loaded, total_count);
            }
        }
    });

    controller.load_initial().await?;
    print_page("first", &controller.visible_slice());

    print_page("jump to", &controller.go_to_page(3).await?);

    let view_len = controller.view().len();
    let outcome = controller.on_range_rendered(view_len.saturating_sub(1)).await?;
    println!("🔭 look-ahead: {:?}", outcome);

    controller
        .set_filter(FilterCriteria::new().with(UserField::Department, "IT")?)
        .await?;
    print_page("IT", &controller.visible_slice());

    controller
        .set_sort(Some(SortConfig::desc(UserField::Age)))
        .await?;
    print_page("IT by age", &controller.visible_slice());

    if let Some(first) = controller.visible_slice().rows.first() {
        controller.select(first.id);
        let saved = controller
            .editor()
            .update_selected(|user| user.job_title = "Director".to_string())
            .await?;
        println!("✏️  saved #{} as {}", saved.id, saved.job_title);
    }

    println!("✅ {} records cached", controller.loaded_len());
    listener.abort();
    Ok(())
}

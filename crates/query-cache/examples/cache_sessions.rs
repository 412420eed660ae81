//! Cache Session Example
//!
//! Demonstrates load-or-store sessions, cache-only loads and write failures.
//!
//! Run with `RUST_LOG=query_cache=debug` to see the cache decisions.

use anyhow::Result;
use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use query_cache::{
    CacheConfig, CacheContext, CacheRegion, CacheStats, LoadOptions, RegionConfig, StoreOptions,
};
use query_core::QueryResult;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Cache Session Example ===\n");

    let stats = Arc::new(CacheStats::new());
    let config = CacheConfig::default()
        .with_region(
            CacheRegion::Data,
            RegionConfig::default().with_default_timeout(Duration::from_secs(600)),
        )
        .with_store_cache_keys(true);
    let context = CacheContext::from_config(&config).with_stats(stats.clone());

    load_or_store(&context)?;
    cache_only(&context);
    invalidation(&context)?;
    write_failure()?;

    println!("\nSession statistics:");
    println!("  Loaded from cache:  {}", stats.loaded_from_cache());
    println!("  Loaded from source: {}", stats.loaded_from_source());
    println!("  Hit rate:           {:.1}%", stats.hit_rate() * 100.0);

    println!("\n=== All cache session examples completed! ===");
    Ok(())
}

fn users_batch() -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
    ]));
    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(StringArray::from(vec!["Alice", "Bob", "Charlie"])),
        ],
    )?)
}

/// Example 1: miss, compute, store, then hit
fn load_or_store(context: &CacheContext) -> Result<()> {
    println!("--- Example 1: Load or Store ---\n");
    let sql = "SELECT id, name FROM users WHERE active = true";

    for attempt in 1..=2 {
        let mut session = context.load(Some("users-active"), CacheRegion::Data, LoadOptions::new())?;
        if session.is_loaded() {
            println!(
                "Attempt {}: cache HIT ({} rows, cached at {:?})",
                attempt,
                session.sql_rowcount().unwrap_or_default(),
                session.cache_timestamp()
            );
        } else {
            println!("Attempt {}: cache MISS, computing", attempt);
            let result = QueryResult::success(sql, vec![users_batch()?]);
            session.store(
                Some("users-active"),
                result,
                None,
                &StoreOptions::new()
                    .with_region(CacheRegion::Data)
                    .with_datasource_uid("users"),
            );
        }
    }
    Ok(())
}

/// Example 2: cache-only load on a missing key
fn cache_only(context: &CacheContext) {
    println!("\n--- Example 2: Cache Only ---\n");
    let options = LoadOptions::new().with_force_cache_only(true);
    match context.load(Some("never-computed"), CacheRegion::Data, options) {
        Ok(_) => println!("Unexpected hit"),
        Err(e) => println!("Cache-only load failed as expected: {}", e),
    }
}

/// Example 3: drop everything cached for a datasource
fn invalidation(context: &CacheContext) -> Result<()> {
    println!("\n--- Example 3: Datasource Invalidation ---\n");
    let removed = context.invalidate_datasource("users", CacheRegion::Data);
    println!("Removed {} cached entries for datasource 'users'", removed);

    let session = context.load(Some("users-active"), CacheRegion::Data, LoadOptions::new())?;
    println!("Loaded after invalidation: {}", session.is_loaded());
    Ok(())
}

/// Example 4: a write the backend rejects fails the session
fn write_failure() -> Result<()> {
    println!("\n--- Example 4: Write Failure ---\n");
    let tiny = CacheConfig::default()
        .with_region(CacheRegion::Default, RegionConfig::default().with_max_memory(64));
    let context = CacheContext::from_config(&tiny);

    let mut session = context.session();
    session.store(
        Some("users-all"),
        QueryResult::success("SELECT id, name FROM users", vec![users_batch()?]),
        None,
        &StoreOptions::new(),
    );

    println!("Status:  {:?}", session.status());
    println!("Error:   {}", session.error_message().unwrap_or_default());
    println!("Batches still readable: {}", session.payload().len());
    Ok(())
}

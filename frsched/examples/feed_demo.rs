//! Démo minimale : un flux de 20 éléments parcouru au curseur, avec une
//! fabrique de lecture factice et sans proxy de cache.
//!
//! ```bash
//! RUST_LOG=debug cargo run -p frsched --example feed_demo
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use frpool::{MediaItem, PlaybackFactory, PlaybackHandle, PoolConfig, PoolEvent, ResourcePool};
use frsched::{SchedulerConfig, WindowScheduler};
use frsource::{CacheResolver, NoopProxy, ResolverConfig};

struct DemoHandle {
    uri: String,
}

#[async_trait]
impl PlaybackHandle for DemoHandle {
    async fn initialize(&self) -> Result<()> {
        // Simule une préparation de pipeline média
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(())
    }
    async fn play(&self) -> Result<()> {
        tracing::info!("play {}", self.uri);
        Ok(())
    }
    async fn pause(&self) -> Result<()> {
        Ok(())
    }
    async fn seek(&self, _position: Duration) -> Result<()> {
        Ok(())
    }
    async fn dispose(&self) -> Result<()> {
        tracing::info!("dispose {}", self.uri);
        Ok(())
    }
}

struct DemoFactory;

#[async_trait]
impl PlaybackFactory for DemoFactory {
    async fn open(&self, uri: &str) -> Result<Arc<dyn PlaybackHandle>> {
        Ok(Arc::new(DemoHandle {
            uri: uri.to_string(),
        }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let resolver = Arc::new(CacheResolver::new(
        ResolverConfig::default(),
        Arc::new(NoopProxy),
    ));
    let pool = ResourcePool::new(
        PoolConfig::default(),
        Arc::new(DemoFactory),
        resolver.clone(),
    );
    let scheduler: WindowScheduler =
        WindowScheduler::new(SchedulerConfig::default(), pool.clone(), resolver);

    let mut events = pool.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                PoolEvent::Ready { item_id } => tracing::info!("ready: {}", item_id),
                PoolEvent::Disposed { item_id } => tracing::info!("disposed: {}", item_id),
            }
        }
    });

    let items: Vec<MediaItem> = (0..20)
        .map(|i| MediaItem::bare(format!("clip-{i}"), format!("http://cdn.local/clip-{i}.mp4")))
        .collect();
    scheduler.set_items(items).await;

    // Navigation délibérée...
    for index in [0, 1, 2, 3] {
        scheduler.on_cursor_move(index).await?;
        pool.play(&format!("clip-{index}")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    // ...puis un grand saut : rééquilibrage agressif
    scheduler.on_cursor_move(15).await?;
    tracing::info!("resident after jump: {:?}", pool.resident_ids().await);

    pool.shutdown().await;
    Ok(())
}

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use frpool::{Acquired, MediaItem, PlaybackFactory, PlaybackHandle, PoolConfig, PoolEvent, ResourcePool};
use frsource::{CacheResolver, NoopProxy, ResolverConfig};

/// Handle de test : compte les appels de cycle de vie.
struct FakeHandle {
    plays: AtomicUsize,
    pauses: AtomicUsize,
    disposes: Arc<AtomicUsize>,
    hang_initialize: bool,
}

#[async_trait]
impl PlaybackHandle for FakeHandle {
    async fn initialize(&self) -> Result<()> {
        if self.hang_initialize {
            // Initialisation qui n'aboutit jamais
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn seek(&self, _position: Duration) -> Result<()> {
        Ok(())
    }

    async fn dispose(&self) -> Result<()> {
        self.disposes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fabrique de test : délai d'ouverture et blocage d'initialisation
/// configurables, compteur de destructions partagé.
struct FakeFactory {
    open_delay: Duration,
    hang_initialize: bool,
    disposes: Arc<AtomicUsize>,
}

impl FakeFactory {
    fn instant() -> Self {
        Self {
            open_delay: Duration::ZERO,
            hang_initialize: false,
            disposes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl PlaybackFactory for FakeFactory {
    async fn open(&self, _uri: &str) -> Result<Arc<dyn PlaybackHandle>> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        Ok(Arc::new(FakeHandle {
            plays: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            disposes: self.disposes.clone(),
            hang_initialize: self.hang_initialize,
        }))
    }
}

fn make_pool(capacity: usize, factory: FakeFactory) -> ResourcePool {
    let resolver = Arc::new(CacheResolver::new(
        ResolverConfig::default(),
        Arc::new(NoopProxy),
    ));
    let config = PoolConfig {
        capacity,
        acquire_timeout_ms: 1_000,
        release_grace_ms: 0,
    };
    ResourcePool::new(config, Arc::new(factory), resolver)
}

fn item(id: &str) -> MediaItem {
    MediaItem::bare(id, format!("http://cdn/{id}.mp4"))
}

async fn acquire_ready(pool: &ResourcePool, id: &str) {
    match pool.acquire(&item(id)).await.unwrap() {
        Acquired::Ready(_) => {}
        Acquired::Pending => panic!("expected '{id}' to be ready"),
    }
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

#[tokio::test]
async fn test_capacity_bound_holds() {
    let pool = make_pool(3, FakeFactory::instant());

    for i in 0..8 {
        acquire_ready(&pool, &format!("item-{i}")).await;
        assert!(pool.len().await <= 3);
    }
    assert_eq!(pool.len().await, 3);
}

#[tokio::test]
async fn test_capacity_bound_under_concurrent_acquires() {
    // Ouverture lente : les deux admissions voient de la place au départ
    let factory = FakeFactory {
        open_delay: Duration::from_millis(50),
        hang_initialize: false,
        disposes: Arc::new(AtomicUsize::new(0)),
    };
    let pool = make_pool(1, factory);

    let p1 = pool.clone();
    let p2 = pool.clone();
    let item_a = item("A");
    let item_b = item("B");
    let (a, b) = tokio::join!(p1.acquire(&item_a), p2.acquire(&item_b));
    assert!(matches!(a.unwrap(), Acquired::Ready(_)));
    assert!(matches!(b.unwrap(), Acquired::Ready(_)));

    // La borne tient aussi quand les ouvertures se recouvrent
    assert!(pool.len().await <= 1);
}

#[tokio::test]
async fn test_capacity_bound_under_concurrent_interleavings() {
    let factory = FakeFactory {
        open_delay: Duration::from_millis(20),
        hang_initialize: false,
        disposes: Arc::new(AtomicUsize::new(0)),
    };
    let pool = make_pool(2, factory);

    let p1 = pool.clone();
    let p2 = pool.clone();
    let p3 = pool.clone();
    let p4 = pool.clone();
    let item_a = item("A");
    let item_b = item("B");
    let item_c = item("C");
    let (a, b, c, _) = tokio::join!(
        p1.acquire(&item_a),
        p2.acquire(&item_b),
        p3.acquire(&item_c),
        async {
            p4.release("A").await;
            let _ = p4.acquire(&item("D")).await;
        }
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    assert!(pool.len().await <= 2);
}

#[tokio::test]
async fn test_lru_evicts_oldest_access() {
    let pool = make_pool(3, FakeFactory::instant());

    // A(t=1), B(t=2), C(t=3) : D évince A
    acquire_ready(&pool, "A").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    acquire_ready(&pool, "B").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    acquire_ready(&pool, "C").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    acquire_ready(&pool, "D").await;

    assert_eq!(
        sorted(pool.resident_ids().await),
        vec!["B".to_string(), "C".to_string(), "D".to_string()]
    );
}

#[tokio::test]
async fn test_touch_refreshes_recency() {
    let pool = make_pool(3, FakeFactory::instant());

    acquire_ready(&pool, "A").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    acquire_ready(&pool, "B").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    acquire_ready(&pool, "C").await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Ré-acquérir A rafraîchit sa récence : la victime devient B
    acquire_ready(&pool, "A").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    acquire_ready(&pool, "D").await;

    assert_eq!(
        sorted(pool.resident_ids().await),
        vec!["A".to_string(), "C".to_string(), "D".to_string()]
    );
}

#[tokio::test]
async fn test_contains_does_not_touch_recency() {
    let pool = make_pool(3, FakeFactory::instant());

    acquire_ready(&pool, "A").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    acquire_ready(&pool, "B").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    acquire_ready(&pool, "C").await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Un simple test de présence ne doit pas sauver A de l'éviction
    assert!(pool.contains("A").await);
    acquire_ready(&pool, "D").await;

    assert!(!pool.contains("A").await);
}

#[tokio::test]
async fn test_double_release_single_teardown() {
    let factory = FakeFactory::instant();
    let disposes = factory.disposes.clone();
    let pool = make_pool(3, factory);

    acquire_ready(&pool, "A").await;

    let p1 = pool.clone();
    let p2 = pool.clone();
    tokio::join!(p1.release("A"), p2.release("A"));

    assert_eq!(disposes.load(Ordering::SeqCst), 1);
    assert!(!pool.contains("A").await);

    // Une libération supplémentaire reste sans effet
    pool.release("A").await;
    assert_eq!(disposes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_release_except_keeps_only_kept() {
    let pool = make_pool(4, FakeFactory::instant());

    for id in ["A", "B", "C", "D"] {
        acquire_ready(&pool, id).await;
    }

    let keep: HashSet<String> = ["B".to_string(), "D".to_string()].into_iter().collect();
    pool.release_except(&keep).await;

    // Le retrait de la map résidente est immédiat, sans attendre les
    // démontages de fond
    assert_eq!(
        sorted(pool.resident_ids().await),
        vec!["B".to_string(), "D".to_string()]
    );
}

#[tokio::test]
async fn test_acquire_timeout_leaves_item_absent() {
    let factory = FakeFactory {
        open_delay: Duration::ZERO,
        hang_initialize: true,
        disposes: Arc::new(AtomicUsize::new(0)),
    };
    let disposes = factory.disposes.clone();
    let resolver = Arc::new(CacheResolver::new(
        ResolverConfig::default(),
        Arc::new(NoopProxy),
    ));
    let pool = ResourcePool::new(
        PoolConfig {
            capacity: 3,
            acquire_timeout_ms: 50,
            release_grace_ms: 0,
        },
        Arc::new(factory),
        resolver,
    );

    let started = std::time::Instant::now();
    let result = pool.acquire(&item("A")).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(frpool::Error::InitFailed { .. })));
    assert!(elapsed < Duration::from_millis(500));
    assert!(!pool.contains("A").await);
    assert_eq!(pool.len().await, 0);

    // La ressource partielle a été détruite, pas fuitée
    assert_eq!(disposes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_acquire_while_initializing_returns_pending() {
    let factory = FakeFactory {
        open_delay: Duration::from_millis(100),
        hang_initialize: false,
        disposes: Arc::new(AtomicUsize::new(0)),
    };
    let pool = make_pool(3, factory);

    let background = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire(&item("A")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // La première acquisition est en vol : pas de relance, juste Pending
    let second = pool.acquire(&item("A")).await.unwrap();
    assert!(matches!(second, Acquired::Pending));

    let first = background.await.unwrap().unwrap();
    assert!(matches!(first, Acquired::Ready(_)));
    assert!(pool.contains("A").await);
}

#[tokio::test]
async fn test_events_ready_and_disposed() {
    let pool = make_pool(3, FakeFactory::instant());
    let mut events = pool.subscribe();

    acquire_ready(&pool, "A").await;
    match events.recv().await.unwrap() {
        PoolEvent::Ready { item_id } => assert_eq!(item_id, "A"),
        other => panic!("unexpected event: {other:?}"),
    }

    pool.release("A").await;
    match events.recv().await.unwrap() {
        PoolEvent::Disposed { item_id } => assert_eq!(item_id, "A"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_never_resident_and_disposing() {
    let factory = FakeFactory::instant();
    let disposes = factory.disposes.clone();
    let resolver = Arc::new(CacheResolver::new(
        ResolverConfig::default(),
        Arc::new(NoopProxy),
    ));
    // Délai de grâce non nul : le démontage reste en vol après release
    let pool = ResourcePool::new(
        PoolConfig {
            capacity: 3,
            acquire_timeout_ms: 1_000,
            release_grace_ms: 50,
        },
        Arc::new(factory),
        resolver,
    );

    acquire_ready(&pool, "A").await;
    let keep: HashSet<String> = HashSet::new();
    pool.release_except(&keep).await;

    // Retiré des résidents avant même que le démontage ne commence
    assert!(!pool.contains("A").await);
    assert_eq!(disposes.load(Ordering::SeqCst), 0);

    // Pendant le démontage, une acquisition répond Pending sans réadmettre
    let during = pool.acquire(&item("A")).await.unwrap();
    assert!(matches!(during, Acquired::Pending));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(disposes.load(Ordering::SeqCst), 1);

    // Démontage terminé : l'élément est redevenu admissible
    acquire_ready(&pool, "A").await;
}

#[tokio::test]
async fn test_pause_all_and_play() {
    let pool = make_pool(3, FakeFactory::instant());

    let handle_a = match pool.acquire(&item("A")).await.unwrap() {
        Acquired::Ready(h) => h,
        Acquired::Pending => panic!("expected ready"),
    };
    acquire_ready(&pool, "B").await;

    pool.pause_all().await;
    pool.play("A").await;
    // Lecture d'un non-résident : avalée, jamais d'erreur
    pool.play("unknown").await;

    // Le handle retourné est bien celui piloté par le pool
    handle_a.seek(Duration::ZERO).await.unwrap();
}

#[tokio::test]
async fn test_shutdown_drains_pool() {
    let factory = FakeFactory::instant();
    let disposes = factory.disposes.clone();
    let pool = make_pool(4, factory);

    for id in ["A", "B", "C"] {
        acquire_ready(&pool, id).await;
    }
    pool.shutdown().await;

    assert!(pool.is_empty().await);
    assert_eq!(disposes.load(Ordering::SeqCst), 3);
}

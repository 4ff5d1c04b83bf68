//! Ordonnanceur de fenêtre glissante autour du curseur.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use frpool::{MediaItem, ResourcePool};
use frsource::CacheResolver;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::detector::ScrollPatternDetector;
use crate::{Error, Result};

/// Configuration de l'ordonnanceur.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Nombre d'éléments préchargés devant le curseur.
    pub preload_ahead: usize,
    /// Nombre d'éléments préchargés derrière le curseur.
    pub preload_behind: usize,
    /// Amplitude de saut (en pages) au-delà de laquelle le défilement est
    /// considéré rapide.
    pub fast_scroll_threshold: usize,
    /// Distance à la fin de liste déclenchant un chargement de la suite.
    pub load_more_threshold: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            preload_ahead: 2,
            preload_behind: 1,
            fast_scroll_threshold: 2,
            load_more_threshold: 3,
        }
    }
}

/// Évènement émis par l'ordonnanceur.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// Le curseur s'est posé sur `index`.
    PageChanged { index: usize },
}

/// Capacité de chargement de la suite du flux.
///
/// Un résultat vide signifie que la source est épuisée. Les erreurs sont
/// propagées telles quelles à l'appelant, jamais retentées par le cœur.
#[async_trait]
pub trait FeedSource<M>: Send + Sync {
    /// Charge la tranche suivante d'éléments.
    async fn load_more(&self) -> AnyResult<Vec<MediaItem<M>>>;
}

/// Ordonnanceur de fenêtre glissante.
///
/// Possède la liste de travail et le curseur. À chaque déplacement, calcule
/// la fenêtre active `[curseur - behind, curseur + ahead]`, libère tout ce
/// qui en sort puis acquiert son contenu par priorité décroissante. Le
/// détecteur de défilement fait basculer les sauts amples sur un
/// rééquilibrage agressif qui ne conserve que l'élément cible.
pub struct WindowScheduler<M = serde_json::Value> {
    config: SchedulerConfig,
    pool: ResourcePool,
    resolver: Arc<CacheResolver>,
    feed_source: Option<Arc<dyn FeedSource<M>>>,
    items: RwLock<Vec<MediaItem<M>>>,
    cursor: AtomicUsize,
    detector: std::sync::Mutex<ScrollPatternDetector>,
    rebalancing: AtomicBool,
    events: broadcast::Sender<SchedulerEvent>,
}

/// Relâche le drapeau de rééquilibrage, y compris sur sortie en erreur.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<M> WindowScheduler<M> {
    /// Crée un ordonnanceur sur un pool et un résolveur injectés.
    pub fn new(config: SchedulerConfig, pool: ResourcePool, resolver: Arc<CacheResolver>) -> Self {
        let detector = ScrollPatternDetector::new(config.fast_scroll_threshold);
        let (events, _) = broadcast::channel(128);
        Self {
            config,
            pool,
            resolver,
            feed_source: None,
            items: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            detector: std::sync::Mutex::new(detector),
            rebalancing: AtomicBool::new(false),
            events,
        }
    }

    /// Attache une source de flux pour le chargement de la suite.
    pub fn with_feed_source(mut self, source: Arc<dyn FeedSource<M>>) -> Self {
        self.feed_source = Some(source);
        self
    }

    /// S'abonne aux évènements de l'ordonnanceur.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events.subscribe()
    }

    /// Remplace la liste de travail.
    ///
    /// Ne touche jamais au pool : le rééquilibrage explicite attend le
    /// prochain déplacement de curseur, pour éviter du brassage inutile sur
    /// une simple mutation de liste.
    pub async fn set_items(&self, items: Vec<MediaItem<M>>) {
        let mut current = self.items.write().await;
        *current = items;
        self.detector.lock().unwrap().reset();
    }

    /// Rééquilibre le pool autour du nouveau curseur.
    ///
    /// Retourne `Ok(false)` si un rééquilibrage était déjà en vol : l'appel
    /// est abandonné plutôt que mis en attente. L'appel suivant repartira du
    /// dernier index au moment de l'appel, les déplacements intermédiaires
    /// rapides sont donc simplement fusionnés.
    pub async fn on_cursor_move(&self, new_index: usize) -> Result<bool> {
        if self
            .rebalancing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(
                "Cursor move to {} dropped: a rebalance is already in flight",
                new_index
            );
            return Ok(false);
        }
        let _guard = PassGuard(&self.rebalancing);

        let items = self.items.read().await;
        if items.is_empty() {
            return Ok(true);
        }
        let index = new_index.min(items.len() - 1);
        let previous = self.cursor.swap(index, Ordering::SeqCst);
        let fast = self.detector.lock().unwrap().detect(previous, index);

        if fast {
            tracing::debug!("Fast scroll {} -> {}: aggressive rebalance", previous, index);
            self.fast_pass(&items, index).await;
        } else {
            self.window_pass(&items, index).await;
        }

        let _ = self.events.send(SchedulerEvent::PageChanged { index });

        let need_more = self.should_load_more(index, items.len());
        drop(items);
        if need_more {
            self.fetch_more().await?;
        }
        Ok(true)
    }

    /// Rééquilibrage agressif : ne conserve que l'élément cible.
    ///
    /// Échange la complétude du préchargement contre une empreinte résidente
    /// minimale pendant un survol rapide.
    pub async fn on_fast_scroll(&self, target: usize) -> Result<bool> {
        if self
            .rebalancing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(
                "Fast scroll to {} dropped: a rebalance is already in flight",
                target
            );
            return Ok(false);
        }
        let _guard = PassGuard(&self.rebalancing);

        let items = self.items.read().await;
        if items.is_empty() {
            return Ok(true);
        }
        let index = target.min(items.len() - 1);
        self.cursor.store(index, Ordering::SeqCst);
        self.fast_pass(&items, index).await;
        let _ = self.events.send(SchedulerEvent::PageChanged { index });
        Ok(true)
    }

    /// Vrai quand `index` approche de la fin d'une liste de `total` éléments.
    pub fn should_load_more(&self, index: usize, total: usize) -> bool {
        total > 0 && index >= total.saturating_sub(self.config.load_more_threshold)
    }

    /// Index courant du curseur.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Taille de la liste de travail.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Vrai après au moins deux sauts rapides consécutifs.
    pub fn is_browsing_mode(&self) -> bool {
        self.detector.lock().unwrap().is_browsing_mode()
    }

    /// Passe fenêtrée, dans l'ordre strict : libération hors fenêtre d'abord
    /// (la place est garantie avant toute admission), élément courant en
    /// priorité 0, préchauffage consultatif, puis voisins au mieux.
    async fn window_pass(&self, items: &[MediaItem<M>], index: usize) {
        let start = index.saturating_sub(self.config.preload_behind);
        let end = (index + self.config.preload_ahead).min(items.len() - 1);

        let keep: HashSet<String> = items[start..=end].iter().map(|i| i.id.clone()).collect();
        self.pool.release_except(&keep).await;

        if let Err(e) = self.pool.acquire(&items[index]).await {
            tracing::warn!("Acquisition of current item '{}' failed: {}", items[index].id, e);
        }

        // Préchauffage du cache upstream pour les éléments d'avance : tâches
        // détachées, purement consultatives, sans aucun effet sur le pool.
        // Jamais annulées si la fenêtre les dépasse entre-temps.
        for item in items.iter().skip(index + 1).take(self.config.preload_ahead) {
            let resolver = self.resolver.clone();
            let url = item.source_url.clone();
            tokio::spawn(async move {
                resolver.precache(&url).await;
            });
        }

        // Voisins immédiats, bornés par la fenêtre ; un échec n'interrompt
        // pas la passe.
        for delta in [1isize, -1, 2, -2] {
            let Some(neighbor) = index.checked_add_signed(delta) else {
                continue;
            };
            if neighbor < start || neighbor > end || neighbor == index {
                continue;
            }
            if let Err(e) = self.pool.acquire(&items[neighbor]).await {
                tracing::debug!("Preload of '{}' failed: {}", items[neighbor].id, e);
            }
        }
    }

    /// Passe agressive : `release_except({cible})` puis acquisition de la
    /// seule cible.
    async fn fast_pass(&self, items: &[MediaItem<M>], index: usize) {
        let target = &items[index];
        let keep: HashSet<String> = std::iter::once(target.id.clone()).collect();
        self.pool.release_except(&keep).await;
        if let Err(e) = self.pool.acquire(target).await {
            tracing::warn!("Acquisition of jump target '{}' failed: {}", target.id, e);
        }
    }

    /// Demande la suite du flux à la source attachée et l'ajoute à la liste.
    async fn fetch_more(&self) -> Result<()> {
        let Some(source) = &self.feed_source else {
            return Ok(());
        };
        let more = source.load_more().await.map_err(Error::LoadMore)?;
        if more.is_empty() {
            tracing::debug!("Feed source exhausted");
            return Ok(());
        }
        tracing::debug!("Appending {} items to the feed", more.len());
        self.items.write().await.extend(more);
        Ok(())
    }
}

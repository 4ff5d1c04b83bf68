//! Pool borné de ressources de lecture avec éviction LRU.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use frsource::CacheResolver;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};

use crate::item::MediaItem;
use crate::phase::ItemPhase;
use crate::playback::{PlaybackFactory, PlaybackHandle};
use crate::{Error, Result};

/// Configuration du pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Nombre maximal de ressources résidentes.
    pub capacity: usize,
    /// Timeout d'ouverture + initialisation d'une ressource (ms).
    pub acquire_timeout_ms: u64,
    /// Délai de grâce avant destruction effective lors d'une libération (ms).
    pub release_grace_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 3,
            acquire_timeout_ms: 10_000,
            release_grace_ms: 200,
        }
    }
}

/// Évènement émis par le pool, consommé par la couche de rendu.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    /// La ressource de `item_id` est prête à jouer.
    Ready { item_id: String },
    /// La ressource de `item_id` vient d'être retirée du pool.
    Disposed { item_id: String },
}

/// Résultat d'une acquisition.
pub enum Acquired {
    /// Handle vivant, prêt à jouer.
    Ready(Arc<dyn PlaybackHandle>),
    /// Une initialisation (ou un démontage) est déjà en cours pour cet
    /// élément, rien n'est relancé. Si c'est une initialisation, son issue
    /// arrive sur le bus : `Ready` en cas de succès, rien en cas d'échec.
    /// Pour un démontage en cours, aucun évènement n'est à attendre :
    /// l'élément redevient admissible à la passe suivante. Ne pas bloquer
    /// indéfiniment sur le bus, retenter plutôt au prochain déplacement.
    Pending,
}

impl fmt::Debug for Acquired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acquired::Ready(_) => f.write_str("Ready(..)"),
            Acquired::Pending => f.write_str("Pending"),
        }
    }
}

/// Entrée résidente : uniquement des éléments en phase `Ready`.
struct ResidentEntry {
    source_url: String,
    handle: Arc<dyn PlaybackHandle>,
    created_at: Instant,
    last_accessed: Instant,
}

/// État comptable du pool, protégé par un Mutex unique.
///
/// La map `phases` rend structurel l'invariant « un élément appartient à au
/// plus un de {résident, en initialisation, en démontage} » : une seule
/// entrée par identifiant, `Absent` = pas d'entrée.
struct PoolState {
    phases: HashMap<String, ItemPhase>,
    resident: HashMap<String, ResidentEntry>,
}

impl PoolState {
    fn phase(&self, item_id: &str) -> ItemPhase {
        self.phases
            .get(item_id)
            .copied()
            .unwrap_or(ItemPhase::Absent)
    }

    /// Unique point de mutation des phases ; rejette les arcs invalides.
    fn set_phase(&mut self, item_id: &str, to: ItemPhase) -> Result<()> {
        let from = self.phase(item_id);
        if !ItemPhase::can_transition(from, to) {
            return Err(Error::InvalidTransition {
                item_id: item_id.to_string(),
                from,
                to,
            });
        }
        if to == ItemPhase::Absent {
            self.phases.remove(item_id);
        } else {
            self.phases.insert(item_id.to_string(), to);
        }
        Ok(())
    }
}

struct PoolInner {
    config: PoolConfig,
    factory: Arc<dyn PlaybackFactory>,
    resolver: Arc<CacheResolver>,
    state: Mutex<PoolState>,
    events: broadcast::Sender<PoolEvent>,
}

/// Pool borné de ressources de lecture.
///
/// Clonable à bas coût ; tous les clones partagent le même état.
///
/// Toutes les mutations comptables (maps `phases` et `resident`) sont
/// sérialisées par le Mutex interne. L'ouverture/initialisation de la
/// ressource et le délai de grâce du démontage s'exécutent hors verrou, si
/// bien qu'une acquisition longue ne bloque pas les opérations portant sur
/// d'autres éléments.
#[derive(Clone)]
pub struct ResourcePool {
    inner: Arc<PoolInner>,
}

impl ResourcePool {
    /// Crée un pool adossé à une fabrique et un résolveur injectés.
    pub fn new(
        config: PoolConfig,
        factory: Arc<dyn PlaybackFactory>,
        resolver: Arc<CacheResolver>,
    ) -> Self {
        let (events, _) = broadcast::channel(128);
        Self {
            inner: Arc::new(PoolInner {
                config,
                factory,
                resolver,
                state: Mutex::new(PoolState {
                    phases: HashMap::new(),
                    resident: HashMap::new(),
                }),
                events,
            }),
        }
    }

    /// S'abonne aux évènements `Ready` / `Disposed` du pool.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.inner.events.subscribe()
    }

    /// Acquiert une ressource de lecture pour `item`.
    ///
    /// - Résident et prêt : rafraîchit la récence, retourne le handle.
    /// - Initialisation ou démontage en cours : retourne [`Acquired::Pending`],
    ///   l'appelant attend l'évènement `Ready` du bus sans relancer.
    /// - Absent : éviction LRU jusqu'à dégager une place, résolution de l'URL
    ///   via le résolveur, puis ouverture + initialisation sous timeout.
    ///
    /// En cas d'échec ou de timeout, la ressource partielle est détruite et
    /// l'élément redevient absent ; une passe de fenêtre ultérieure pourra
    /// retenter.
    pub async fn acquire<M>(&self, item: &MediaItem<M>) -> Result<Acquired> {
        {
            let mut state = self.inner.state.lock().await;
            match state.phase(&item.id) {
                ItemPhase::Ready => {
                    let entry = state
                        .resident
                        .get_mut(&item.id)
                        .ok_or_else(|| Error::InitFailed {
                            item_id: item.id.clone(),
                            reason: "ready item missing from resident map".to_string(),
                        })?;
                    entry.last_accessed = Instant::now();
                    return Ok(Acquired::Ready(entry.handle.clone()));
                }
                ItemPhase::Initializing | ItemPhase::Disposing => {
                    return Ok(Acquired::Pending);
                }
                ItemPhase::Absent => {
                    self.evict_to_capacity(&mut state, &item.id);
                    state.set_phase(&item.id, ItemPhase::Initializing)?;
                }
            }
        }

        let opened = self.open_with_timeout(&item.source_url).await;

        let mut state = self.inner.state.lock().await;
        match opened {
            Ok(handle) => {
                // Le verrou a été relâché pendant l'ouverture : d'autres
                // admissions ont pu aboutir entre-temps. Ré-évincer avant
                // d'insérer pour que la borne tienne aussi sous acquisitions
                // concurrentes.
                self.evict_to_capacity(&mut state, &item.id);
                state.set_phase(&item.id, ItemPhase::Ready)?;
                let now = Instant::now();
                state.resident.insert(
                    item.id.clone(),
                    ResidentEntry {
                        source_url: item.source_url.clone(),
                        handle: handle.clone(),
                        created_at: now,
                        last_accessed: now,
                    },
                );
                let _ = self.inner.events.send(PoolEvent::Ready {
                    item_id: item.id.clone(),
                });
                Ok(Acquired::Ready(handle))
            }
            Err(reason) => {
                state.set_phase(&item.id, ItemPhase::Absent)?;
                tracing::debug!("Acquisition of '{}' failed: {}", item.id, reason);
                Err(Error::InitFailed {
                    item_id: item.id.clone(),
                    reason,
                })
            }
        }
    }

    /// Libère la ressource de `item_id` et attend la fin du démontage.
    ///
    /// Idempotent : sans effet si l'élément est absent ou déjà en cours de
    /// démontage. L'entrée résidente est retirée avant le début du démontage,
    /// elle ne peut donc plus être évincée ni relue entre-temps.
    pub async fn release(&self, item_id: &str) {
        let entry = {
            let mut state = self.inner.state.lock().await;
            self.begin_dispose(&mut state, item_id)
        };
        if let Some(entry) = entry {
            Self::teardown(self.inner.clone(), item_id.to_string(), entry).await;
        }
    }

    /// Libère tous les éléments résidents hors de `keep`.
    ///
    /// Les entrées sont retirées de la map résidente sous un seul verrou :
    /// au retour, la place est garantie pour de nouvelles admissions. Les
    /// démontages eux-mêmes s'exécutent en tâches de fond et vont à leur
    /// terme (pas d'annulation).
    pub async fn release_except(&self, keep: &HashSet<String>) {
        let mut state = self.inner.state.lock().await;
        let victims: Vec<String> = state
            .resident
            .keys()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();
        for item_id in victims {
            if let Some(entry) = self.begin_dispose(&mut state, &item_id) {
                tokio::spawn(Self::teardown(self.inner.clone(), item_id, entry));
            }
        }
    }

    /// Met en pause toutes les ressources résidentes.
    ///
    /// Les échecs sont journalisés, jamais propagés.
    pub async fn pause_all(&self) {
        let handles: Vec<(String, Arc<dyn PlaybackHandle>)> = {
            let state = self.inner.state.lock().await;
            state
                .resident
                .iter()
                .map(|(id, e)| (id.clone(), e.handle.clone()))
                .collect()
        };
        for (item_id, handle) in handles {
            if let Err(e) = handle.pause().await {
                tracing::warn!("Failed to pause '{}': {}", item_id, e);
            }
        }
    }

    /// Démarre la lecture de `item_id` s'il est résident.
    ///
    /// Les échecs sont journalisés, jamais propagés. Ne rafraîchit pas la
    /// récence : seul un accès retournant le handle compte pour la LRU.
    pub async fn play(&self, item_id: &str) {
        let handle = {
            let state = self.inner.state.lock().await;
            state.resident.get(item_id).map(|e| e.handle.clone())
        };
        match handle {
            Some(handle) => {
                if let Err(e) = handle.play().await {
                    tracing::warn!("Failed to start playback of '{}': {}", item_id, e);
                }
            }
            None => tracing::debug!("Play requested for non-resident '{}'", item_id),
        }
    }

    /// Libère toutes les ressources et attend la fin de tous les démontages.
    pub async fn shutdown(&self) {
        let entries: Vec<(String, ResidentEntry)> = {
            let mut state = self.inner.state.lock().await;
            let ids: Vec<String> = state.resident.keys().cloned().collect();
            ids.into_iter()
                .filter_map(|id| self.begin_dispose(&mut state, &id).map(|e| (id, e)))
                .collect()
        };
        for (item_id, entry) in entries {
            Self::teardown(self.inner.clone(), item_id, entry).await;
        }
    }

    /// Identifiants actuellement résidents.
    pub async fn resident_ids(&self) -> Vec<String> {
        let state = self.inner.state.lock().await;
        state.resident.keys().cloned().collect()
    }

    /// Nombre de ressources résidentes.
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.resident.len()
    }

    /// Vrai si le pool ne détient aucune ressource.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Test de présence, sans effet sur la récence LRU.
    pub async fn contains(&self, item_id: &str) -> bool {
        self.inner.state.lock().await.resident.contains_key(item_id)
    }

    /// Évince les résidents les moins récemment accédés jusqu'à dégager une
    /// place pour `incoming`.
    ///
    /// Victime : plus ancien `last_accessed`, départagé par plus ancien
    /// `created_at`. Les éléments en démontage ne sont plus résidents et
    /// l'élément entrant est exclu : un élément n'est jamais évincé par sa
    /// propre admission.
    fn evict_to_capacity(&self, state: &mut PoolState, incoming: &str) {
        while state.resident.len() >= self.inner.config.capacity {
            let victim = state
                .resident
                .iter()
                .filter(|(id, _)| id.as_str() != incoming)
                .min_by_key(|(_, e)| (e.last_accessed, e.created_at))
                .map(|(id, _)| id.clone());
            let Some(victim) = victim else { break };
            tracing::debug!(
                "Evicting '{}' (LRU, pool at capacity {})",
                victim,
                self.inner.config.capacity
            );
            if let Some(entry) = self.begin_dispose(state, &victim) {
                tokio::spawn(Self::teardown(self.inner.clone(), victim, entry));
            }
        }
    }

    /// Entame un démontage : retire l'entrée résidente, passe en `Disposing`
    /// et émet `Disposed`.
    ///
    /// Retourne `None` si l'élément n'est pas résident (absent, en
    /// initialisation, ou déjà en démontage) : c'est ce test, fait sous le
    /// même verrou que le retrait, qui garantit un unique démontage par
    /// cycle.
    fn begin_dispose(&self, state: &mut PoolState, item_id: &str) -> Option<ResidentEntry> {
        if state.phase(item_id) != ItemPhase::Ready {
            return None;
        }
        let entry = state.resident.remove(item_id)?;
        if let Err(e) = state.set_phase(item_id, ItemPhase::Disposing) {
            tracing::error!("Phase bookkeeping error for '{}': {}", item_id, e);
        }
        let _ = self.inner.events.send(PoolEvent::Disposed {
            item_id: item_id.to_string(),
        });
        Some(entry)
    }

    /// Démontage ordonné : pause, retour au début, délai de grâce fixe puis
    /// destruction. Chaque échec est journalisé et avalé ; l'entrée résidente
    /// ayant été retirée avant, aucun échec ne peut laisser un résident
    /// fantôme.
    async fn teardown(inner: Arc<PoolInner>, item_id: String, entry: ResidentEntry) {
        inner.resolver.invalidate(&entry.source_url);

        if let Err(e) = entry.handle.pause().await {
            tracing::debug!("Pause during teardown of '{}' failed: {}", item_id, e);
        }
        if let Err(e) = entry.handle.seek(Duration::ZERO).await {
            tracing::debug!("Seek during teardown of '{}' failed: {}", item_id, e);
        }

        // Délai fixe plutôt qu'une attente de signaux de la plateforme, qui
        // peuvent ne jamais arriver.
        tokio::time::sleep(Duration::from_millis(inner.config.release_grace_ms)).await;

        if let Err(e) = entry.handle.dispose().await {
            tracing::warn!("Disposal of '{}' failed: {}", item_id, e);
        }

        let mut state = inner.state.lock().await;
        if let Err(e) = state.set_phase(&item_id, ItemPhase::Absent) {
            tracing::error!("Phase bookkeeping error for '{}': {}", item_id, e);
        }
    }

    /// Résout l'URL puis ouvre et initialise la ressource sous le timeout
    /// configuré. En cas d'échec après ouverture, le handle partiel est
    /// détruit au mieux : jamais de fuite.
    async fn open_with_timeout(
        &self,
        source_url: &str,
    ) -> std::result::Result<Arc<dyn PlaybackHandle>, String> {
        let uri = self.inner.resolver.resolved_url(source_url).await;
        let timeout = Duration::from_millis(self.inner.config.acquire_timeout_ms);
        let deadline = tokio::time::Instant::now() + timeout;

        let handle = match tokio::time::timeout_at(deadline, self.inner.factory.open(&uri)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => return Err(format!("open timed out after {}ms", timeout.as_millis())),
        };

        match tokio::time::timeout_at(deadline, handle.initialize()).await {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => {
                if let Err(de) = handle.dispose().await {
                    tracing::debug!("Disposal of partially opened resource failed: {}", de);
                }
                Err(e.to_string())
            }
            Err(_) => {
                if let Err(de) = handle.dispose().await {
                    tracing::debug!("Disposal of partially opened resource failed: {}", de);
                }
                Err(format!(
                    "initialization timed out after {}ms",
                    timeout.as_millis()
                ))
            }
        }
    }
}

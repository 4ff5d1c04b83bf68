//! # frpool - Pool de ressources de lecture pour FeedRoll
//!
//! Cette crate gère un ensemble borné de ressources de lecture coûteuses
//! (décodeurs, pipelines média) pour un flux d'éléments défilant en continu.
//! La mémoire et la bande passante restent bornées tandis que la lecture
//! paraît instantanée autour du curseur.
//!
//! ## Vue d'ensemble
//!
//! - [`MediaItem`] : élément du flux, identifiant stable + URL source +
//!   métadonnées opaques jamais inspectées par le cœur.
//! - [`PlaybackFactory`] / [`PlaybackHandle`] : capacités fournies par
//!   l'intégrateur pour ouvrir et piloter la ressource sous-jacente.
//! - [`ResourcePool`] : magasin borné par clé avec éviction LRU, acquisition
//!   asynchrone sous timeout et libération ordonnée avec délai de grâce.
//! - [`ItemPhase`] : machine à états par élément
//!   (`Absent → Initializing → Ready → Disposing → Absent`), avec une unique
//!   fonction de transition qui rejette les arcs invalides.
//!
//! ## Architecture
//!
//! ```text
//! ResourcePool
//!     ├── PoolState (Mutex unique)
//!     │     ├── phases   : item_id → ItemPhase
//!     │     └── resident : item_id → ResidentEntry (Ready uniquement)
//!     ├── CacheResolver (frsource) : résolution d'URL à l'acquisition
//!     └── broadcast<PoolEvent> : Ready / Disposed vers la couche de rendu
//! ```
//!
//! Toutes les mutations comptables passent par le Mutex unique ; l'ouverture
//! et l'initialisation de la ressource, ainsi que le délai de grâce de la
//! libération, s'exécutent hors verrou.
//!
//! ## Invariants
//!
//! 1. `resident.len() <= capacity` après chaque opération.
//! 2. Un handle retourné à l'appelant est toujours prêt, jamais en erreur.
//! 3. Une libération d'un élément déjà en cours de libération est un no-op :
//!    au plus un démontage par élément et par cycle.

pub mod item;
pub mod phase;
pub mod playback;
pub mod pool;

pub use item::MediaItem;
pub use phase::ItemPhase;
pub use playback::{PlaybackFactory, PlaybackHandle};
pub use pool::{Acquired, PoolConfig, PoolEvent, ResourcePool};

/// Erreurs du pool de ressources
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Resource initialization failed for '{item_id}': {reason}")]
    InitFailed { item_id: String, reason: String },

    #[error("Invalid item transition for '{item_id}': {from:?} -> {to:?}")]
    InvalidTransition {
        item_id: String,
        from: ItemPhase,
        to: ItemPhase,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type Result spécialisé pour frpool
pub type Result<T> = std::result::Result<T, Error>;

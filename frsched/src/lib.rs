//! # frsched - Ordonnanceur de fenêtre pour FeedRoll
//!
//! Cette crate décide, à chaque déplacement du curseur dans le flux, quels
//! éléments méritent une ressource de lecture vivante du pool (`frpool`).
//!
//! ## Vue d'ensemble
//!
//! - [`ScrollPatternDetector`] : classifieur de défilement, distingue la
//!   navigation délibérée du survol rapide.
//! - [`WindowScheduler`] : possède la liste d'éléments et le curseur ;
//!   recalcule la fenêtre active à chaque déplacement, libère hors fenêtre
//!   puis acquiert dans la fenêtre par ordre de priorité. En survol rapide,
//!   bascule sur un rééquilibrage agressif réduit au seul élément cible.
//! - [`FeedSource`] : capacité de chargement de la suite du flux, consultée
//!   quand le curseur approche de la fin de la liste.
//!
//! ## Flot de contrôle
//!
//! ```text
//! curseur UI ──> on_cursor_move
//!                   ├── detect (rapide ?)
//!                   ├── release_except(fenêtre)        [complet avant la suite]
//!                   ├── acquire(élément courant)       [priorité 0]
//!                   ├── precache d'avance (consultatif, hors pool)
//!                   ├── acquire(voisins ±1, ±2)        [au mieux]
//!                   ├── PageChanged
//!                   └── load_more si proche de la fin
//! ```

pub mod detector;
pub mod scheduler;

pub use detector::ScrollPatternDetector;
pub use scheduler::{FeedSource, SchedulerConfig, SchedulerEvent, WindowScheduler};

/// Erreurs de l'ordonnanceur
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Loading more feed items failed: {0}")]
    LoadMore(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type Result spécialisé pour frsched
pub type Result<T> = std::result::Result<T, Error>;

//! Capacités de lecture fournies par l'intégrateur.
//!
//! Le cœur ne décode ni ne dessine rien : il pilote uniquement le cycle de
//! vie de ces handles (ouverture, initialisation, lecture, libération).

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

/// Fabrique de ressources de lecture.
#[async_trait]
pub trait PlaybackFactory: Send + Sync {
    /// Ouvre une ressource de lecture sur `uri`.
    ///
    /// Peut échouer ou ne jamais aboutir ; le pool applique son propre
    /// timeout autour de l'ouverture et de l'initialisation.
    async fn open(&self, uri: &str) -> Result<std::sync::Arc<dyn PlaybackHandle>>;
}

/// Handle vivant sur une ressource de lecture.
///
/// Toutes les opérations sont faillibles ; le pool journalise les échecs de
/// démontage sans jamais les propager.
#[async_trait]
pub trait PlaybackHandle: Send + Sync {
    /// Prépare la ressource jusqu'à l'état jouable.
    async fn initialize(&self) -> Result<()>;

    /// Démarre la lecture.
    async fn play(&self) -> Result<()>;

    /// Met la lecture en pause.
    async fn pause(&self) -> Result<()>;

    /// Positionne la tête de lecture.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Détruit la ressource et libère ses tampons.
    async fn dispose(&self) -> Result<()>;
}

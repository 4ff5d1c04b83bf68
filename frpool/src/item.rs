//! Élément de flux média.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Élément d'un flux média défilant.
///
/// Possédé par l'appelant ; le cœur ne conserve que l'identifiant et l'URL
/// dont il a besoin. Le paramètre `M` est un point d'extension typé pour les
/// métadonnées du domaine (titre, durée, auteur...) : le cœur ne les lit
/// jamais. Par défaut un [`serde_json::Value`] pour les intégrations sans
/// schéma.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem<M = Value> {
    /// Identifiant unique dans la liste, stable entre rechargements.
    pub id: String,
    /// URL de la source média.
    pub source_url: String,
    /// Charge utile opaque définie par le consommateur.
    pub metadata: M,
}

impl<M> MediaItem<M> {
    /// Crée un élément avec ses métadonnées.
    pub fn new(id: impl Into<String>, source_url: impl Into<String>, metadata: M) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            metadata,
        }
    }
}

impl MediaItem<Value> {
    /// Crée un élément sans métadonnées.
    pub fn bare(id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self::new(id, source_url, Value::Null)
    }
}

//! Machine à états par élément du pool.

use serde::{Deserialize, Serialize};

/// Phase de vie d'un élément vis-à-vis du pool.
///
/// Les arcs autorisés :
///
/// ```text
/// Absent ──acquire──> Initializing ──succès──> Ready ──release──> Disposing ──fin──> Absent
///                          │
///                          └──échec/timeout──> Absent
/// ```
///
/// Aucun arc ne quitte `Disposing` sauf vers `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemPhase {
    /// Aucune ressource, aucune opération en cours.
    Absent,
    /// Ouverture/initialisation de la ressource en cours.
    Initializing,
    /// Ressource vivante, handle disponible.
    Ready,
    /// Démontage ordonné en cours.
    Disposing,
}

impl ItemPhase {
    /// Unique fonction de validité des transitions.
    ///
    /// Tout changement de phase du pool passe par ce prédicat ; un arc
    /// absent de cette liste est un bug du pool, pas un cas métier.
    pub fn can_transition(from: ItemPhase, to: ItemPhase) -> bool {
        use ItemPhase::*;
        matches!(
            (from, to),
            (Absent, Initializing)
                | (Initializing, Ready)
                | (Initializing, Absent)
                | (Ready, Disposing)
                | (Disposing, Absent)
        )
    }
}

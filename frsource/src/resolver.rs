//! Résolution d'URL avec cache de traduction et circuit breaker.
//!
//! Le [`CacheResolver`] est construit explicitement et injecté dans chaque
//! pool qui en a besoin : pas de singleton, plusieurs pools indépendants
//! peuvent coexister avec leur propre résolveur (tests isolés compris).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::proxy::UpstreamProxy;

/// Configuration du résolveur.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Nombre d'échecs de traduction consécutifs avant ouverture du circuit.
    pub max_failures: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self { max_failures: 3 }
    }
}

/// État mutable partagé du résolveur.
///
/// Verrou std : jamais tenu à travers un `.await`, les appels upstream se
/// font hors verrou.
struct ResolverState {
    failure_count: u32,
    translations: HashMap<String, String>,
}

/// Résolveur d'URL source vers URL proxifiée.
///
/// Chaque résolution retourne toujours une URL utilisable :
/// - circuit ouvert → URL originale, sans contacter l'upstream ;
/// - cache de traduction → valeur mémorisée ;
/// - sinon traduction upstream, avec repli silencieux sur l'URL originale
///   en cas d'échec.
///
/// Un succès de traduction remet le compteur d'échecs à zéro. Une fois le
/// circuit ouvert, plus aucune tentative n'a lieu : la fermeture passe par
/// [`CacheResolver::reset_circuit`].
pub struct CacheResolver {
    config: ResolverConfig,
    upstream: Arc<dyn UpstreamProxy>,
    state: RwLock<ResolverState>,
}

impl CacheResolver {
    /// Crée un résolveur adossé à un proxy upstream.
    pub fn new(config: ResolverConfig, upstream: Arc<dyn UpstreamProxy>) -> Self {
        Self {
            config,
            upstream,
            state: RwLock::new(ResolverState {
                failure_count: 0,
                translations: HashMap::new(),
            }),
        }
    }

    /// Résout une URL source vers sa forme proxifiée.
    ///
    /// Ne retourne jamais d'erreur : tout échec dégrade vers `original`.
    pub async fn resolved_url(&self, original: &str) -> String {
        {
            let state = self.state.read().unwrap();
            if state.failure_count >= self.config.max_failures {
                return original.to_string();
            }
            if let Some(translated) = state.translations.get(original) {
                return translated.clone();
            }
        }

        match self.upstream.translate(original).await {
            Ok(translated) => {
                let mut state = self.state.write().unwrap();
                state.failure_count = 0;
                state
                    .translations
                    .insert(original.to_string(), translated.clone());
                translated
            }
            Err(e) => {
                let mut state = self.state.write().unwrap();
                state.failure_count += 1;
                if state.failure_count == self.config.max_failures {
                    tracing::warn!(
                        "Proxy circuit opened after {} consecutive failures: {}",
                        state.failure_count,
                        e
                    );
                } else {
                    tracing::debug!(
                        "Proxy translation failed ({}/{}): {}",
                        state.failure_count,
                        self.config.max_failures,
                        e
                    );
                }
                original.to_string()
            }
        }
    }

    /// Indique si le chemin proxy est actuellement utilisable.
    pub fn should_use_proxy(&self) -> bool {
        self.state.read().unwrap().failure_count < self.config.max_failures
    }

    /// Remise à zéro manuelle du circuit (commande opérateur).
    pub fn reset_circuit(&self) {
        let mut state = self.state.write().unwrap();
        if state.failure_count > 0 {
            tracing::info!(
                "Proxy circuit manually reset (failure count was {})",
                state.failure_count
            );
        }
        state.failure_count = 0;
    }

    /// Retire `url` du cache de traduction.
    ///
    /// Appelé à la libération d'une ressource pour qu'une traduction
    /// périmée ne survive pas à la ressource qui la référençait.
    pub fn invalidate(&self, url: &str) {
        self.state.write().unwrap().translations.remove(url);
    }

    /// Demande le préchauffage du cache upstream pour `url`.
    ///
    /// Purement consultatif : les échecs sont journalisés et n'alimentent
    /// pas le compteur du circuit. Sans effet quand le circuit est ouvert.
    pub async fn precache(&self, url: &str) {
        if !self.should_use_proxy() {
            return;
        }
        if let Err(e) = self.upstream.precache(url).await {
            tracing::debug!("Precache of '{}' failed: {}", url, e);
        }
    }

    /// Compteur d'échecs courant.
    pub fn failure_count(&self) -> u32 {
        self.state.read().unwrap().failure_count
    }

    /// Nombre de traductions mémorisées.
    pub fn cached_len(&self) -> usize {
        self.state.read().unwrap().translations.len()
    }
}

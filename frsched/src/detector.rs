//! Classifieur de motifs de défilement.

/// Distingue un saut de curseur « rapide » d'un déplacement normal.
///
/// Un saut est rapide quand son amplitude dépasse le seuil configuré. Le
/// détecteur entretient un compteur de sauts rapides consécutifs, exposé via
/// [`ScrollPatternDetector::is_browsing_mode`] : information disponible pour
/// une politique adaptative, jamais prescriptive, c'est l'appelant qui décide
/// d'en tenir compte.
#[derive(Debug)]
pub struct ScrollPatternDetector {
    threshold: usize,
    last_index: Option<usize>,
    consecutive_fast: u32,
}

impl ScrollPatternDetector {
    /// Crée un détecteur avec un seuil d'amplitude (en pages).
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            last_index: None,
            consecutive_fast: 0,
        }
    }

    /// Classifie le saut `from → to`.
    ///
    /// Incrémente le compteur de sauts rapides consécutifs sur un saut
    /// rapide, le remet à zéro sinon, et mémorise `to` comme dernier index
    /// vu.
    pub fn detect(&mut self, from: usize, to: usize) -> bool {
        let fast = from.abs_diff(to) > self.threshold;
        if fast {
            self.consecutive_fast += 1;
        } else {
            self.consecutive_fast = 0;
        }
        self.last_index = Some(to);
        fast
    }

    /// Vrai après au moins deux sauts rapides consécutifs.
    pub fn is_browsing_mode(&self) -> bool {
        self.consecutive_fast >= 2
    }

    /// Dernier index vu par le détecteur.
    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    /// Oublie le dernier index vu et le compteur de sauts rapides.
    pub fn reset(&mut self) {
        self.last_index = None;
        self.consecutive_fast = 0;
    }
}

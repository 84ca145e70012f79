// DANS : src/filtering/admission.rs

use std::{
    collections::HashSet,
    sync::Mutex,
    time::{Duration, Instant},
};

/// Décide si un trade entrant mérite d'être traité : les deux symboles
/// doivent être autorisés et un délai minimum doit séparer deux admissions.
pub struct AdmissionFilter {
    allowed_tokens: HashSet<String>,
    min_spacing: Duration,
    last_admitted: Mutex<Option<Instant>>,
}

impl AdmissionFilter {
    pub fn new(allowed_tokens: HashSet<String>, min_spacing: Duration) -> Self {
        Self {
            allowed_tokens,
            min_spacing,
            last_admitted: Mutex::new(None),
        }
    }

    pub fn is_allowed_pair(&self, buy_symbol: &str, sell_symbol: &str) -> bool {
        self.allowed_tokens.contains(buy_symbol) && self.allowed_tokens.contains(sell_symbol)
    }

    /// Vérifie puis enregistre l'admission dans la même section critique :
    /// l'espacement est mesuré depuis l'heure d'admission, pas de fin de traitement.
    /// Seuls les symboles comptent ici, le reste du trade est décodé après.
    pub fn admit(&self, buy_symbol: &str, sell_symbol: &str, now: Instant) -> bool {
        if !self.is_allowed_pair(buy_symbol, sell_symbol) {
            return false;
        }

        let mut last = self.last_admitted.lock().unwrap_or_else(|p| p.into_inner());
        let spaced_enough = match *last {
            Some(previous) => now.saturating_duration_since(previous) >= self.min_spacing,
            None => true,
        };
        if spaced_enough {
            *last = Some(now);
        }
        spaced_enough
    }
}

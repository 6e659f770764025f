// ============================================================================
// SEARCH THROTTLE - Gating de búsquedas disparadas por el viewport
// ============================================================================
// Máquina de estados pura: el timer de quiescencia vive en el controlador
// (cada movimiento reemplaza el timer, así gana el último evento). Aquí se
// decide si un disparo se convierte en búsqueda. El instante actual entra
// como argumento para poder testear sin reloj del navegador.
// ============================================================================

use crate::config::SearchConfig;
use crate::models::geo::Bounds;

pub struct SearchThrottle {
    min_interval_ms: f64,
    bounds_epsilon_deg: f64,
    last_search_ms: Option<f64>,
    last_bounds: Option<Bounds>,
    in_flight: bool,
}

impl SearchThrottle {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            min_interval_ms: config.min_interval_ms,
            bounds_epsilon_deg: config.bounds_epsilon_deg,
            last_search_ms: None,
            last_bounds: None,
            in_flight: false,
        }
    }

    /// Disparo por movimiento del viewport. Devuelve true si la búsqueda
    /// debe lanzarse; en ese caso queda registrada como en curso.
    ///
    /// Se descarta si: hay una búsqueda en curso (no se encola), no pasó el
    /// intervalo mínimo desde la última, o los bounds son casi idénticos a
    /// los de la última búsqueda.
    pub fn try_begin_viewport(&mut self, bounds: Bounds, now_ms: f64) -> bool {
        if self.in_flight {
            return false;
        }

        if let Some(last) = self.last_search_ms {
            if now_ms - last < self.min_interval_ms {
                return false;
            }
        }

        if let Some(last) = &self.last_bounds {
            if last.is_similar(&bounds, self.bounds_epsilon_deg) {
                return false;
            }
        }

        self.last_search_ms = Some(now_ms);
        self.last_bounds = Some(bounds);
        self.in_flight = true;
        true
    }

    /// Disparo manual (búsqueda por texto, cambio de servicio, inicial).
    /// Ignora el gating por bounds e intervalo pero respeta la búsqueda
    /// única en curso.
    pub fn try_begin_manual(&mut self, now_ms: f64) -> bool {
        if self.in_flight {
            return false;
        }
        self.last_search_ms = Some(now_ms);
        self.in_flight = true;
        true
    }

    /// La búsqueda en curso terminó (con éxito o error)
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    /// Olvidar el historial (cambio de servicio): la misma región vuelve a
    /// ser buscable de inmediato
    pub fn reset(&mut self) {
        self.last_search_ms = None;
        self.last_bounds = None;
    }

    /// Sembrar los bounds iniciales sin lanzar búsqueda, para que el primer
    /// asentamiento del mapa no dispare una repetida
    pub fn record_bounds(&mut self, bounds: Bounds) {
        self.last_bounds = Some(bounds);
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> SearchThrottle {
        SearchThrottle::new(&SearchConfig::default())
    }

    fn bounds(sw_lat: f64, sw_lon: f64, ne_lat: f64, ne_lon: f64) -> Bounds {
        Bounds::from_array([[sw_lat, sw_lon], [ne_lat, ne_lon]]).unwrap()
    }

    #[test]
    fn first_viewport_trigger_fires() {
        let mut t = throttle();
        assert!(t.try_begin_viewport(bounds(55.70, 37.55, 55.80, 37.70), 1000.0));
        assert!(t.in_flight());
    }

    #[test]
    fn trigger_while_in_flight_is_dropped_not_queued() {
        let mut t = throttle();
        assert!(t.try_begin_viewport(bounds(55.70, 37.55, 55.80, 37.70), 1000.0));
        assert!(!t.try_begin_viewport(bounds(56.00, 38.00, 56.10, 38.10), 5000.0));

        t.finish();
        // Tras terminar, un viewport distinto vuelve a poder buscarse
        assert!(t.try_begin_viewport(bounds(56.00, 38.00, 56.10, 38.10), 5000.0));
    }

    #[test]
    fn similar_bounds_are_suppressed() {
        let mut t = throttle();
        assert!(t.try_begin_viewport(bounds(55.70, 37.55, 55.80, 37.70), 1000.0));
        t.finish();

        // Todos los deltas por debajo del epsilon por defecto (0.01)
        assert!(!t.try_begin_viewport(bounds(55.7005, 37.5505, 55.8005, 37.7005), 5000.0));
    }

    #[test]
    fn min_interval_enforced_even_for_different_bounds() {
        let mut t = throttle();
        assert!(t.try_begin_viewport(bounds(55.70, 37.55, 55.80, 37.70), 1000.0));
        t.finish();

        // Región distinta pero demasiado pronto
        assert!(!t.try_begin_viewport(bounds(56.00, 38.00, 56.10, 38.10), 1300.0));
        // La misma región, pasado el intervalo, sí
        assert!(t.try_begin_viewport(bounds(56.00, 38.00, 56.10, 38.10), 1600.0));
    }

    #[test]
    fn manual_bypasses_bounds_gating() {
        let mut t = throttle();
        assert!(t.try_begin_viewport(bounds(55.70, 37.55, 55.80, 37.70), 1000.0));
        t.finish();

        // La búsqueda por texto ignora bounds e intervalo
        assert!(t.try_begin_manual(1100.0));
        assert!(t.in_flight());
    }

    #[test]
    fn manual_respects_single_in_flight() {
        let mut t = throttle();
        assert!(t.try_begin_manual(1000.0));
        assert!(!t.try_begin_manual(1001.0));
        t.finish();
        assert!(t.try_begin_manual(1002.0));
    }

    #[test]
    fn reset_allows_identical_bounds_again() {
        let mut t = throttle();
        let b = bounds(55.70, 37.55, 55.80, 37.70);
        assert!(t.try_begin_viewport(b, 1000.0));
        t.finish();

        t.reset();
        assert!(t.try_begin_viewport(b, 1001.0));
    }

    #[test]
    fn recorded_bounds_suppress_without_searching() {
        let mut t = throttle();
        let b = bounds(55.70, 37.55, 55.80, 37.70);
        t.record_bounds(b);
        assert!(!t.in_flight());
        assert!(!t.try_begin_viewport(b, 1000.0));
    }
}

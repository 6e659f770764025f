use serde::{Deserialize, Serialize};

use crate::models::geo::{Coordinate, DEFAULT_CITY_CENTER};

/// Configuración global de la aplicación
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub geolocation: GeolocationConfig,
    pub search: SearchConfig,
    pub map: MapViewConfig,
    pub submit: SubmitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            geolocation: GeolocationConfig::default(),
            search: SearchConfig::default(),
            map: MapViewConfig::default(),
            submit: SubmitConfig::default(),
        }
    }
}

/// Orden de las estrategias de geolocalización.
///
/// `IpFirstRace` lanza la consulta por IP (sin prompt de permisos) en
/// paralelo con la geolocalización del navegador: la primera que resuelva
/// posiciona el mapa y, si la del navegador llega después y difiere más del
/// umbral, el mapa se recentra en silencio. `PromptFirst` pide primero al
/// navegador y usa la IP solo como fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeolocationPolicy {
    IpFirstRace,
    PromptFirst,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationConfig {
    pub policy: GeolocationPolicy,
    /// Timeout de la geolocalización del navegador (ms)
    pub browser_timeout_ms: u32,
    /// Timeout por proveedor de la cadena de lookup por IP (ms)
    pub ip_provider_timeout_ms: u32,
    /// Distancia a partir de la cual un resultado tardío recentra el mapa (km)
    pub recenter_threshold_km: f64,
    /// Centro usado cuando todas las estrategias fallan
    pub default_center: Coordinate,
    /// Zoom al centrar en la ubicación del usuario
    pub locate_zoom: f64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            policy: GeolocationPolicy::IpFirstRace,
            browser_timeout_ms: 3000,
            ip_provider_timeout_ms: 3000,
            recenter_threshold_km: 0.5,
            default_center: DEFAULT_CITY_CENTER,
            locate_zoom: 15.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Ventana de quiescencia tras el último movimiento del mapa (ms)
    pub quiescence_ms: u32,
    /// Intervalo mínimo entre búsquedas, independiente del debounce (ms)
    pub min_interval_ms: f64,
    /// Umbral de similitud entre bounds, por componente (grados)
    pub bounds_epsilon_deg: f64,
    /// Máximo de resultados por búsqueda
    pub results_limit: u32,
    /// Backoff fijo antes del único reintento por error de red (ms)
    pub retry_backoff_ms: u32,
    /// Debounce del campo de búsqueda por texto (ms)
    pub input_debounce_ms: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            quiescence_ms: 500,
            min_interval_ms: 500.0,
            bounds_epsilon_deg: 0.01,
            results_limit: 20,
            retry_backoff_ms: 2000,
            input_debounce_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapViewConfig {
    /// ID del contenedor del mapa en el DOM
    pub container_id: String,
    pub initial_zoom: f64,
    /// Zoom al seleccionar un punto
    pub select_zoom: f64,
    /// Margen del auto-ajuste de la primera búsqueda (px)
    pub fit_margin_px: u32,
    /// Espera hasta considerar el mapa listo para búsquedas por viewport (ms)
    pub ready_delay_ms: u32,
}

impl Default for MapViewConfig {
    fn default() -> Self {
        Self {
            container_id: "map".to_string(),
            initial_zoom: 12.0,
            select_zoom: 16.0,
            fit_margin_px: 40,
            ready_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    /// Espera antes de pedir al host el cierre tras un envío exitoso (ms)
    pub close_delay_ms: u32,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            close_delay_ms: 300,
        }
    }
}

// ============================================================================
// APP - Controlador principal
// ============================================================================
// Dueño del contexto de sesión: config, estado, mapa, marcadores y throttle.
// Los eventos JS (clicks, timers, promesas) re-entran via crate::with_app;
// ningún borrow se mantiene a través de un await.
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use gloo_timers::future::TimeoutFuture;
use wasm_bindgen::closure::Closure;
use wasm_bindgen_futures::spawn_local;

use crate::config::AppConfig;
use crate::dom;
use crate::maps::markers::{ApplyOutcome, MarkerSetManager};
use crate::maps::traits::{MapPort, MarkerId};
use crate::maps::ymaps::{places_search, YandexMap};
use crate::models::error::AppError;
use crate::models::geo::{haversine_km, Bounds, Coordinate};
use crate::models::point::{service_config, DeliveryPoint, ServiceId};
use crate::services::geolocation::{self, LocateError, PermissionState};
use crate::services::search::SearchThrottle;
use crate::services::telegram::{submit_selection, HapticStyle, HostBridge, SubmitOutcome, TelegramWebApp};
use crate::state::SessionState;
use crate::views;

/// Aplicación principal
pub struct App {
    pub config: AppConfig,
    pub state: SessionState,
    bridge: TelegramWebApp,
    map: Option<YandexMap>,
    markers: MarkerSetManager,
    throttle: SearchThrottle,
}

fn now_ms() -> f64 {
    js_sys::Date::now()
}

impl App {
    pub fn new(config: AppConfig, bridge: TelegramWebApp) -> Self {
        let markers = MarkerSetManager::new(config.map.fit_margin_px, config.map.select_zoom);
        let throttle = SearchThrottle::new(&config.search);
        Self {
            config,
            state: SessionState::new(),
            bridge,
            map: None,
            markers,
            throttle,
        }
    }

    /// Crear el mapa real y registrar el handler de movimiento de viewport
    pub fn install_map(&mut self, center: Coordinate) -> Result<(), crate::maps::MapError> {
        let on_marker_click: Rc<dyn Fn(MarkerId)> = Rc::new(|id| {
            crate::with_app(|app| app.on_marker_click(id));
        });
        let map = YandexMap::create(&self.config.map, center, on_marker_click)?;

        // Timer de quiescencia: cada movimiento reemplaza el anterior, así
        // el callback corre una sola vez con los bounds del último evento
        let timer: Rc<RefCell<Option<Timeout>>> = Rc::new(RefCell::new(None));
        let quiescence_ms = self.config.search.quiescence_ms;
        let on_viewport = Closure::wrap(Box::new(move || {
            let replaced = Timeout::new(quiescence_ms, || {
                crate::with_app(|app| app.on_viewport_quiescent());
            });
            // Soltar el timer anterior lo cancela
            *timer.borrow_mut() = Some(replaced);
        }) as Box<dyn FnMut()>);
        map.on_viewport_event(&on_viewport)?;
        on_viewport.forget();

        self.map = Some(map);
        Ok(())
    }

    /// El mapa quedó quieto el tiempo suficiente: candidata a búsqueda
    pub fn on_viewport_quiescent(&mut self) {
        if !self.state.map_ready {
            return;
        }
        let Some(bounds) = self.map.as_ref().and_then(|m| m.viewport()) else {
            return;
        };
        if !self.throttle.try_begin_viewport(bounds, now_ms()) {
            return;
        }

        if !self.markers.is_empty() {
            dom::show_map_overlay("Обновляем пункты...", true);
        }
        self.spawn_search(self.default_query(), bounds);
    }

    /// Consulta de búsqueda del servicio activo
    pub fn default_query(&self) -> String {
        service_config(self.state.current_service).query.to_string()
    }

    /// Búsqueda programática (inicial, cambio de servicio o por texto):
    /// sin gating por bounds, pero una sola búsqueda en vuelo
    fn start_search_with_query(&mut self, query: String) {
        let Some(bounds) = self.map.as_ref().and_then(|m| m.viewport()) else {
            return;
        };
        if !self.throttle.try_begin_manual(now_ms()) {
            log::info!("⏳ Búsqueda en curso, disparo descartado");
            return;
        }

        if self.markers.is_empty() {
            dom::show_map_overlay("Ищем пункты выдачи...", false);
        }
        self.spawn_search(query, bounds);
    }

    /// Lanzar la búsqueda como tarea; un error de red se reintenta una vez
    /// tras el backoff fijo, con la misma consulta
    fn spawn_search(&self, query: String, bounds: Bounds) {
        let limit = self.config.search.results_limit;
        let backoff_ms = self.config.search.retry_backoff_ms;
        let service = self.state.current_service;

        spawn_local(async move {
            let mut result = places_search(&query, bounds, limit, service).await;

            if let Err(e) = &result {
                if e.is_network_class() {
                    log::warn!("🔁 Error de red en la búsqueda, reintento en {} ms: {}", backoff_ms, e);
                    TimeoutFuture::new(backoff_ms).await;
                    result = places_search(&query, bounds, limit, service).await;
                }
            }

            crate::with_app(|app| app.finish_search(result));
        });
    }

    /// Aplicar el resultado de la búsqueda. Siempre limpia el estado de
    /// "en vuelo" y el overlay, también en los caminos de error.
    fn finish_search(&mut self, result: Result<Vec<DeliveryPoint>, AppError>) {
        self.throttle.finish();
        dom::hide_map_overlay();

        let Some(map) = self.map.as_mut() else {
            return;
        };

        match result {
            Ok(points) => match self.markers.apply_results(map, points) {
                Ok(ApplyOutcome::Replaced(count)) => {
                    log::info!("✅ {} puntos en el mapa", count);
                    // El reemplazo invalida la selección
                    views::hide_point_info();
                }
                Ok(ApplyOutcome::NoResults) => {
                    dom::show_map_overlay("Пункты не найдены, попробуйте другой район", false);
                    dom::schedule_hide_map_overlay(3000);
                }
                Err(e) => log::error!("❌ Error actualizando marcadores: {}", e),
            },
            Err(e) => {
                // Error no reintentable o reintento agotado: se absorbe
                log::error!("❌ Error en la búsqueda de puntos: {}", e);
            }
        }
    }

    /// Cambio de servicio desde las pestañas
    pub fn change_service(&mut self, service: ServiceId) {
        log::info!("🚚 Cambiando servicio a {}", service_config(service).display_name);
        self.state.current_service = service;

        views::hide_point_info();

        if let Some(map) = self.map.as_mut() {
            if let Err(e) = self.markers.clear(map) {
                log::warn!("⚠️ Error limpiando marcadores: {}", e);
            }
        }

        self.throttle.reset();
        let query = self.default_query();
        self.start_search_with_query(query);
        self.bridge.haptic(HapticStyle::Medium);
    }

    /// Búsqueda por texto del buscador. Más de dos caracteres acotan la
    /// consulta del servicio; vacío restaura la consulta por defecto.
    pub fn search_with_query(&mut self, text: &str) {
        let trimmed = text.trim();
        if trimmed.chars().count() > 2 {
            let query = format!("{} {}", self.default_query(), trimmed);
            self.start_search_with_query(query);
        } else if trimmed.is_empty() {
            let query = self.default_query();
            self.start_search_with_query(query);
        }
    }

    /// Click en un marcador del mapa
    pub fn on_marker_click(&mut self, id: MarkerId) {
        self.bridge.haptic(HapticStyle::Selection);

        let Some(map) = self.map.as_mut() else {
            return;
        };
        match self.markers.select(map, id) {
            Ok(point) => {
                let point = point.clone();
                log::info!("📌 Punto seleccionado: {}", point.name);
                views::show_point_info(&point);
            }
            Err(e) => log::warn!("⚠️ Selección de marcador falló: {}", e),
        }
    }

    /// Click en el botón de confirmar
    pub fn submit_clicked(&mut self) {
        self.bridge.haptic(HapticStyle::Medium);

        let result = submit_selection(
            &self.bridge,
            self.markers.selected_point(),
            self.config.submit.close_delay_ms,
        );
        match result {
            Ok(SubmitOutcome::Sent) => log::info!("✅ Selección enviada al host"),
            Ok(SubmitOutcome::NothingSelected) => {
                log::info!("⚠️ Confirmación sin punto seleccionado")
            }
            Err(e) => log::error!("❌ {}", e),
        }
    }

    /// Botón de geolocalización: navegador primero, después la ubicación
    /// cacheada de la sesión y por último la cadena IP.
    /// Una denegación previa en esta sesión saltea el intento del navegador.
    pub fn center_on_user(&mut self) {
        let browser_timeout_ms = self.config.geolocation.browser_timeout_ms;
        let ip_timeout_ms = self.config.geolocation.ip_provider_timeout_ms;
        let zoom = self.config.geolocation.locate_zoom;
        let cached = self.state.user_location;
        let denied_this_session = self.state.permission == PermissionState::Denied;

        spawn_local(async move {
            let browser = if denied_this_session {
                Err(LocateError::Denied)
            } else {
                geolocation::browser_location(browser_timeout_ms, false).await
            };
            match browser {
                Ok(coordinate) => {
                    crate::with_app(|app| {
                        app.state.set_permission(PermissionState::Granted);
                        app.bridge.haptic(HapticStyle::Light);
                        app.recenter(coordinate, zoom, true);
                    });
                }
                Err(le) => {
                    log::warn!("⚠️ Geolocalización del navegador falló: {}", le);
                    crate::with_app(|app| app.state.set_permission(le.permission_state()));

                    let fallback = match cached {
                        Some(coordinate) => Some(coordinate),
                        None => geolocation::ip_location(ip_timeout_ms).await.ok(),
                    };
                    match fallback {
                        Some(coordinate) => {
                            crate::with_app(|app| app.recenter(coordinate, zoom, true));
                        }
                        None => log::error!("❌ No se pudo centrar el mapa en ninguna ubicación"),
                    }
                }
            }
        });
    }

    /// Centrar el mapa y cachear la ubicación
    pub fn recenter(&mut self, coordinate: Coordinate, zoom: f64, animated: bool) {
        self.state.user_location = Some(coordinate);
        if let Some(map) = self.map.as_mut() {
            if let Err(e) = map.set_center(coordinate, zoom, animated) {
                log::warn!("⚠️ No se pudo centrar el mapa: {}", e);
            }
        }
    }

    /// El mapa terminó de asentarse: habilitar búsquedas por viewport y
    /// sembrar los bounds actuales para no repetir la búsqueda inicial
    pub fn mark_ready(&mut self) {
        self.state.map_ready = true;
        if let Some(bounds) = self.map.as_ref().and_then(|m| m.viewport()) {
            self.throttle.record_bounds(bounds);
        }
        dom::set_map_full_height(true);
        log::info!("✅ Mapa listo para búsquedas por viewport");
    }

    /// Haptic directo (para controles que solo necesitan feedback)
    pub fn bridge_haptic(&self, style: HapticStyle) {
        self.bridge.haptic(style);
    }
}

/// Flujo de arranque: ubicación → mapa → controles → búsqueda inicial
pub async fn bootstrap() {
    dom::set_loader_active(true);

    let Some(config) = crate::with_app(|app| app.config.clone()) else {
        return;
    };
    let threshold_km = config.geolocation.recenter_threshold_km;
    let initial_zoom = config.map.initial_zoom;

    // Si gana la IP y el resultado de alta precisión llega después con una
    // diferencia mayor al umbral, el mapa se recentra en silencio
    let resolution = geolocation::resolve(&config.geolocation, move |late| match late {
        Ok(coordinate) => {
            crate::with_app(|app| {
                app.state.set_permission(PermissionState::Granted);
                let winner = app
                    .state
                    .user_location
                    .unwrap_or(app.config.geolocation.default_center);
                let distance_km = haversine_km(winner, coordinate);
                if distance_km > threshold_km {
                    log::info!(
                        "🎯 Resultado de alta precisión a {:.2} km del inicial, recentrando",
                        distance_km
                    );
                    app.recenter(coordinate, initial_zoom, true);
                } else {
                    app.state.user_location = Some(coordinate);
                }
            });
        }
        Err(le) => {
            crate::with_app(|app| app.state.set_permission(le.permission_state()));
        }
    })
    .await;

    log::info!(
        "📍 Ubicación inicial via {:?}: ({}, {})",
        resolution.source,
        resolution.coordinate.latitude(),
        resolution.coordinate.longitude()
    );

    let installed = crate::with_app(|app| {
        app.state.user_location = Some(resolution.coordinate);
        if let Some(permission) = resolution.permission {
            app.state.set_permission(permission);
        }
        app.install_map(resolution.coordinate)
    });
    match installed {
        Some(Ok(())) => {}
        Some(Err(e)) => {
            log::error!("❌ Error inicializando el mapa: {}", e);
            dom::set_loader_active(false);
            return;
        }
        None => return,
    }

    views::init_controls(config.search.input_debounce_ms);
    views::create_geolocation_button();

    // Búsqueda inicial con la consulta del servicio activo
    crate::with_app(|app| {
        let query = app.default_query();
        app.start_search_with_query(query);
    });

    // Dejar que el mapa se asiente antes de habilitar búsquedas por viewport
    Timeout::new(config.map.ready_delay_ms, || {
        crate::with_app(|app| app.mark_ready());
    })
    .forget();

    dom::set_loader_active(false);
}

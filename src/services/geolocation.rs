// ============================================================================
// GEOLOCALIZACIÓN - Resolución de ubicación con estrategias en paralelo
// ============================================================================
// Cadena IP (sin prompt) + geolocalización del navegador (con permiso),
// combinadas según la política configurada. resolve() nunca falla: en el
// peor caso devuelve el centro por defecto.
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{self, Either};
use gloo_net::http::Request;
use gloo_timers::future::TimeoutFuture;
use serde::Deserialize;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;

use crate::config::{GeolocationConfig, GeolocationPolicy};
use crate::dom;
use crate::models::error::AppError;
use crate::models::geo::Coordinate;
use crate::utils::constants::GEOLOCATION_PERMITTED_KEY;
use crate::utils::storage;

/// Estado del permiso de geolocalización tras el último intento
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Unknown,
    Granted,
    Denied,
    Unavailable,
    Timeout,
}

/// Fallo de la geolocalización del navegador
#[derive(Debug, Clone, PartialEq)]
pub enum LocateError {
    Unsupported,
    Denied,
    Unavailable,
    Timeout,
    Js(String),
}

impl LocateError {
    pub fn permission_state(&self) -> PermissionState {
        match self {
            LocateError::Denied => PermissionState::Denied,
            LocateError::Unsupported | LocateError::Unavailable => PermissionState::Unavailable,
            LocateError::Timeout => PermissionState::Timeout,
            LocateError::Js(_) => PermissionState::Unavailable,
        }
    }
}

impl std::fmt::Display for LocateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocateError::Unsupported => write!(f, "Geolocation is not supported"),
            LocateError::Denied => write!(f, "Geolocation permission denied"),
            LocateError::Unavailable => write!(f, "Position unavailable"),
            LocateError::Timeout => write!(f, "Geolocation timed out"),
            LocateError::Js(msg) => write!(f, "Geolocation error: {}", msg),
        }
    }
}

/// De dónde salió la coordenada inicial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSource {
    Browser,
    IpLookup,
    Default,
}

/// Resultado de la resolución inicial. `permission` es None cuando el
/// intento del navegador sigue pendiente (ganó la IP en la carrera).
pub struct Resolution {
    pub coordinate: Coordinate,
    pub source: LocationSource,
    pub permission: Option<PermissionState>,
}

/// Leer el flag de sesión "geolocalización ya permitida/denegada"
pub fn session_permission_flag() -> Option<bool> {
    storage::load_from_session(GEOLOCATION_PERMITTED_KEY)
}

fn remember_permission(granted: bool) {
    if let Err(e) = storage::save_to_session(GEOLOCATION_PERMITTED_KEY, &granted) {
        log::warn!("⚠️ No se pudo guardar el flag de geolocalización: {}", e);
    }
}

/// Geolocalización del navegador envuelta como future, con timeout acotado
/// via PositionOptions. Actualiza el flag de sesión según el resultado.
pub async fn browser_location(timeout_ms: u32, show_prompt: bool) -> Result<Coordinate, LocateError> {
    let geolocation = web_sys::window()
        .and_then(|w| w.navigator().geolocation().ok())
        .ok_or(LocateError::Unsupported)?;

    if show_prompt {
        dom::show_toast("Запрашиваем доступ к вашему местоположению...", 5000);
    }

    let options = web_sys::PositionOptions::new();
    options.set_enable_high_accuracy(true);
    options.set_timeout(timeout_ms);
    options.set_maximum_age(0);

    let (tx, rx) = oneshot::channel::<Result<Coordinate, LocateError>>();
    let tx = Rc::new(RefCell::new(Some(tx)));

    let tx_ok = tx.clone();
    let on_success = Closure::wrap(Box::new(move |position: web_sys::Position| {
        let coords = position.coords();
        let result = Coordinate::new(coords.latitude(), coords.longitude())
            .map_err(|e| LocateError::Js(e.to_string()));
        if let Some(tx) = tx_ok.borrow_mut().take() {
            let _ = tx.send(result);
        }
    }) as Box<dyn FnMut(web_sys::Position)>);

    let tx_err = tx.clone();
    let on_error = Closure::wrap(Box::new(move |error: web_sys::PositionError| {
        let failure = match error.code() {
            1 => LocateError::Denied,
            2 => LocateError::Unavailable,
            3 => LocateError::Timeout,
            _ => LocateError::Js(error.message()),
        };
        if let Some(tx) = tx_err.borrow_mut().take() {
            let _ = tx.send(Err(failure));
        }
    }) as Box<dyn FnMut(web_sys::PositionError)>);

    geolocation
        .get_current_position_with_error_callback_and_options(
            on_success.as_ref().unchecked_ref(),
            Some(on_error.as_ref().unchecked_ref()),
            &options,
        )
        .map_err(|e| LocateError::Js(format!("{:?}", e)))?;

    // Los closures deben vivir hasta que el navegador responda
    let result = rx
        .await
        .unwrap_or(Err(LocateError::Js("geolocation channel dropped".to_string())));
    drop(on_success);
    drop(on_error);

    match &result {
        Ok(_) => remember_permission(true),
        Err(LocateError::Denied) => {
            remember_permission(false);
            if show_prompt {
                dom::show_toast(
                    "Для точного определения пунктов выдачи разрешите доступ к геолокации",
                    4000,
                );
            }
        }
        Err(LocateError::Unavailable) | Err(LocateError::Unsupported) => {
            if show_prompt {
                dom::show_toast("Не удалось определить ваше местоположение", 3000);
            }
        }
        Err(LocateError::Timeout) => {
            if show_prompt {
                dom::show_toast("Истекло время определения местоположения", 3000);
            }
        }
        Err(LocateError::Js(_)) => {}
    }

    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpProvider {
    Ipapi,
    IpApi,
    Ipinfo,
}

const IP_PROVIDERS: [IpProvider; 3] = [IpProvider::Ipapi, IpProvider::IpApi, IpProvider::Ipinfo];

impl IpProvider {
    fn url(&self) -> &'static str {
        match self {
            IpProvider::Ipapi => "https://ipapi.co/json/",
            IpProvider::IpApi => "https://ip-api.com/json/",
            IpProvider::Ipinfo => "https://ipinfo.io/json",
        }
    }
}

/// Normalizar la respuesta de cada proveedor a una coordenada validada
fn parse_ip_response(provider: IpProvider, body: &str) -> Result<Coordinate, AppError> {
    match provider {
        IpProvider::Ipapi => {
            #[derive(Deserialize)]
            struct IpapiResponse {
                latitude: f64,
                longitude: f64,
            }
            let response: IpapiResponse = serde_json::from_str(body)
                .map_err(|e| AppError::MalformedResponse(e.to_string()))?;
            Coordinate::new(response.latitude, response.longitude)
        }
        IpProvider::IpApi => {
            #[derive(Deserialize)]
            struct IpApiResponse {
                lat: f64,
                lon: f64,
            }
            let response: IpApiResponse = serde_json::from_str(body)
                .map_err(|e| AppError::MalformedResponse(e.to_string()))?;
            Coordinate::new(response.lat, response.lon)
        }
        IpProvider::Ipinfo => {
            #[derive(Deserialize)]
            struct IpinfoResponse {
                loc: String,
            }
            let response: IpinfoResponse = serde_json::from_str(body)
                .map_err(|e| AppError::MalformedResponse(e.to_string()))?;
            let (lat, lon) = response
                .loc
                .split_once(',')
                .ok_or_else(|| AppError::MalformedResponse(format!("bad loc: {}", response.loc)))?;
            let lat: f64 = lat
                .trim()
                .parse()
                .map_err(|_| AppError::MalformedResponse(format!("bad loc: {}", response.loc)))?;
            let lon: f64 = lon
                .trim()
                .parse()
                .map_err(|_| AppError::MalformedResponse(format!("bad loc: {}", response.loc)))?;
            Coordinate::new(lat, lon)
        }
    }
}

/// GET con señal de aborto y timeout acotado
async fn fetch_with_timeout(url: &str, timeout_ms: u32) -> Result<String, AppError> {
    let controller = web_sys::AbortController::new()
        .map_err(|e| AppError::NetworkFailure(format!("{:?}", e)))?;
    let signal = controller.signal();

    let fetch = Box::pin(Request::get(url).abort_signal(Some(&signal)).send());
    let timeout = Box::pin(TimeoutFuture::new(timeout_ms));

    match future::select(fetch, timeout).await {
        Either::Left((response, _)) => {
            let response = response.map_err(|e| AppError::NetworkFailure(e.to_string()))?;
            if !response.ok() {
                return Err(AppError::NetworkFailure(format!("HTTP {}", response.status())));
            }
            response
                .text()
                .await
                .map_err(|e| AppError::NetworkFailure(e.to_string()))
        }
        Either::Right(((), _)) => {
            controller.abort();
            Err(AppError::NetworkTimeout)
        }
    }
}

/// Recorrer la cadena de proveedores IP hasta la primera coordenada válida
pub async fn ip_location(provider_timeout_ms: u32) -> Result<Coordinate, AppError> {
    let mut last_error = AppError::NetworkFailure("no providers tried".to_string());

    for provider in IP_PROVIDERS {
        match fetch_with_timeout(provider.url(), provider_timeout_ms).await {
            Ok(body) => match parse_ip_response(provider, &body) {
                Ok(coordinate) => {
                    log::info!(
                        "🌐 Ubicación por IP via {}: ({}, {})",
                        provider.url(),
                        coordinate.latitude(),
                        coordinate.longitude()
                    );
                    return Ok(coordinate);
                }
                Err(e) => {
                    log::warn!("⚠️ Respuesta malformada de {}: {}", provider.url(), e);
                    last_error = e;
                }
            },
            Err(e) => {
                log::warn!("⚠️ Proveedor {} falló: {}", provider.url(), e);
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// Resolver la ubicación inicial según la política configurada.
///
/// Nunca falla: si todas las estrategias fallan devuelve el centro por
/// defecto. `on_late_browser` se invoca solo en la variante de carrera,
/// cuando el resultado del navegador llega después de que la IP ya ganó.
pub async fn resolve<F>(config: &GeolocationConfig, on_late_browser: F) -> Resolution
where
    F: FnOnce(Result<Coordinate, LocateError>) + 'static,
{
    let flag = session_permission_flag();

    match config.policy {
        GeolocationPolicy::IpFirstRace => resolve_ip_first(config, flag, on_late_browser).await,
        GeolocationPolicy::PromptFirst => resolve_prompt_first(config, flag).await,
    }
}

async fn resolve_ip_first<F>(
    config: &GeolocationConfig,
    flag: Option<bool>,
    on_late_browser: F,
) -> Resolution
where
    F: FnOnce(Result<Coordinate, LocateError>) + 'static,
{
    let ip = Box::pin(ip_location(config.ip_provider_timeout_ms));

    // Denegado antes en esta sesión: no volver a molestar con el prompt
    if flag == Some(false) {
        return match ip.await {
            Ok(coordinate) => Resolution {
                coordinate,
                source: LocationSource::IpLookup,
                permission: Some(PermissionState::Denied),
            },
            Err(e) => {
                log::warn!("⚠️ Lookup por IP falló: {}", e);
                Resolution {
                    coordinate: config.default_center,
                    source: LocationSource::Default,
                    permission: Some(PermissionState::Denied),
                }
            }
        };
    }

    let show_prompt = flag != Some(true);
    let browser = Box::pin(browser_location(config.browser_timeout_ms, show_prompt));

    match future::select(ip, browser).await {
        Either::Left((Ok(coordinate), browser_pending)) => {
            // La IP ganó: el resultado de alta precisión puede llegar después
            spawn_local(async move {
                on_late_browser(browser_pending.await);
            });
            Resolution {
                coordinate,
                source: LocationSource::IpLookup,
                permission: None,
            }
        }
        Either::Left((Err(e), browser_pending)) => {
            log::warn!("⚠️ Lookup por IP falló: {}", e);
            match browser_pending.await {
                Ok(coordinate) => Resolution {
                    coordinate,
                    source: LocationSource::Browser,
                    permission: Some(PermissionState::Granted),
                },
                Err(le) => {
                    log::warn!("⚠️ Geolocalización del navegador falló: {}", le);
                    Resolution {
                        coordinate: config.default_center,
                        source: LocationSource::Default,
                        permission: Some(le.permission_state()),
                    }
                }
            }
        }
        Either::Right((Ok(coordinate), _ip_pending)) => Resolution {
            coordinate,
            source: LocationSource::Browser,
            permission: Some(PermissionState::Granted),
        },
        Either::Right((Err(le), ip_pending)) => {
            log::warn!("⚠️ Geolocalización del navegador falló: {}", le);
            let permission = le.permission_state();
            match ip_pending.await {
                Ok(coordinate) => Resolution {
                    coordinate,
                    source: LocationSource::IpLookup,
                    permission: Some(permission),
                },
                Err(e) => {
                    log::warn!("⚠️ Lookup por IP falló: {}", e);
                    Resolution {
                        coordinate: config.default_center,
                        source: LocationSource::Default,
                        permission: Some(permission),
                    }
                }
            }
        }
    }
}

async fn resolve_prompt_first(config: &GeolocationConfig, flag: Option<bool>) -> Resolution {
    let mut permission = PermissionState::Unknown;

    if flag != Some(false) {
        match browser_location(config.browser_timeout_ms, flag != Some(true)).await {
            Ok(coordinate) => {
                return Resolution {
                    coordinate,
                    source: LocationSource::Browser,
                    permission: Some(PermissionState::Granted),
                };
            }
            Err(le) => {
                log::warn!("⚠️ Geolocalización del navegador falló: {}", le);
                permission = le.permission_state();
            }
        }
    } else {
        permission = PermissionState::Denied;
    }

    match ip_location(config.ip_provider_timeout_ms).await {
        Ok(coordinate) => Resolution {
            coordinate,
            source: LocationSource::IpLookup,
            permission: Some(permission),
        },
        Err(e) => {
            log::warn!("⚠️ Lookup por IP falló: {}", e);
            Resolution {
                coordinate: config.default_center,
                source: LocationSource::Default,
                permission: Some(permission),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipapi_shape() {
        let body = r#"{"ip":"1.2.3.4","latitude":55.7558,"longitude":37.6173,"city":"Moscow"}"#;
        let c = parse_ip_response(IpProvider::Ipapi, body).unwrap();
        assert_eq!(c.latitude(), 55.7558);
        assert_eq!(c.longitude(), 37.6173);
    }

    #[test]
    fn parses_ip_api_shape() {
        let body = r#"{"status":"success","lat":55.7558,"lon":37.6173}"#;
        let c = parse_ip_response(IpProvider::IpApi, body).unwrap();
        assert_eq!(c.latitude(), 55.7558);
        assert_eq!(c.longitude(), 37.6173);
    }

    #[test]
    fn parses_ipinfo_loc_string() {
        let body = r#"{"ip":"1.2.3.4","loc":"55.7558,37.6173"}"#;
        let c = parse_ip_response(IpProvider::Ipinfo, body).unwrap();
        assert_eq!(c.latitude(), 55.7558);
        assert_eq!(c.longitude(), 37.6173);
    }

    #[test]
    fn all_providers_normalize_to_same_coordinate() {
        let a = parse_ip_response(IpProvider::Ipapi, r#"{"latitude":48.85,"longitude":2.35}"#)
            .unwrap();
        let b = parse_ip_response(IpProvider::IpApi, r#"{"lat":48.85,"lon":2.35}"#).unwrap();
        let c = parse_ip_response(IpProvider::Ipinfo, r#"{"loc":"48.85,2.35"}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn rejects_malformed_bodies() {
        assert!(parse_ip_response(IpProvider::Ipapi, "not json").is_err());
        assert!(parse_ip_response(IpProvider::IpApi, r#"{"status":"fail"}"#).is_err());
        assert!(parse_ip_response(IpProvider::Ipinfo, r#"{"loc":"55.7558"}"#).is_err());
        assert!(parse_ip_response(IpProvider::Ipinfo, r#"{"loc":"abc,def"}"#).is_err());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(parse_ip_response(IpProvider::IpApi, r#"{"lat":123.0,"lon":37.0}"#).is_err());
        assert!(parse_ip_response(IpProvider::Ipinfo, r#"{"loc":"55.0,181.0"}"#).is_err());
    }

    #[test]
    fn locate_error_maps_to_permission_state() {
        assert_eq!(LocateError::Denied.permission_state(), PermissionState::Denied);
        assert_eq!(LocateError::Timeout.permission_state(), PermissionState::Timeout);
        assert_eq!(
            LocateError::Unsupported.permission_state(),
            PermissionState::Unavailable
        );
        assert_eq!(
            LocateError::Unavailable.permission_state(),
            PermissionState::Unavailable
        );
    }
}

// ============================================================================
// PICKUP POINT PICKER - Mini App de Telegram (Rust puro + WASM)
// ============================================================================
// El usuario elige un punto de recogida sobre un mapa interactivo y la
// selección vuelve al shell de Telegram.
// - models: tipos de dominio (coordenadas, puntos, errores)
// - services: geolocalización, throttle de búsquedas, bridge de Telegram
// - maps: contrato del mapa, gestor de marcadores, adaptador Yandex
// - views/dom: cableado de controles y feedback visual
// - app: controlador dueño del contexto de sesión
// ============================================================================

mod app;
mod config;
mod dom;
mod maps;
mod models;
mod services;
mod state;
mod utils;
mod views;

use std::cell::RefCell;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_logger::Config;

use crate::app::App;
use crate::config::AppConfig;
use crate::services::telegram::{self, HostBridge, TelegramWebApp};

// Variable estática global para mantener la instancia de App
thread_local! {
    static APP: RefCell<Option<App>> = RefCell::new(None);
}

#[wasm_bindgen(start)]
pub fn main() -> Result<(), JsValue> {
    // Panic hook para mejor debugging
    console_error_panic_hook::set_once();

    wasm_logger::init(Config::default());
    log::info!("🚀 Pickup Point Picker - Mini App (Rust puro + WASM)");

    // Señalizar al host y aplicar su tema
    let bridge = TelegramWebApp::new();
    bridge.ready();
    bridge.expand();
    telegram::apply_theme(&bridge);
    telegram::watch_theme_changes();

    let app = App::new(AppConfig::default(), bridge);
    APP.with(|cell| {
        *cell.borrow_mut() = Some(app);
    });

    // Inyectar el SDK de mapas y arrancar cuando esté listo
    load_maps_sdk()?;

    Ok(())
}

/// Inyectar el script del SDK de Yandex Maps (con la API key de compilación)
/// y encadenar el arranque a ymaps.ready.
/// Nota: closure.forget() es necesario para mantener los closures vivos en
/// Rust WASM. Ambos callbacks se registran una sola vez en el arranque, por
/// lo que no hay riesgo de acumulación.
fn load_maps_sdk() -> Result<(), JsValue> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("No document"))?;

    let script = document.create_element("script")?;
    let url = if utils::constants::YMAPS_API_KEY.is_empty() {
        "https://api-maps.yandex.ru/2.1/?lang=ru_RU".to_string()
    } else {
        format!(
            "https://api-maps.yandex.ru/2.1/?apikey={}&lang=ru_RU",
            utils::constants::YMAPS_API_KEY
        )
    };
    script.set_attribute("src", &url)?;

    let on_load = Closure::wrap(Box::new(|| {
        log::info!("🗺️ SDK de mapas cargado");
        let on_maps_ready = Closure::wrap(Box::new(|| {
            wasm_bindgen_futures::spawn_local(app::bootstrap());
        }) as Box<dyn FnMut()>);
        maps::ymaps::ymaps_ready(on_maps_ready.as_ref().unchecked_ref());
        on_maps_ready.forget();
    }) as Box<dyn FnMut()>);
    script.add_event_listener_with_callback("load", on_load.as_ref().unchecked_ref())?;
    on_load.forget();

    document
        .head()
        .ok_or_else(|| JsValue::from_str("No <head>"))?
        .append_child(&script)?;

    Ok(())
}

/// Ejecutar un closure con acceso mutable a la app global.
/// Devuelve None si la app todavía no fue inicializada.
pub(crate) fn with_app<R>(f: impl FnOnce(&mut App) -> R) -> Option<R> {
    APP.with(|cell| cell.borrow_mut().as_mut().map(f))
}

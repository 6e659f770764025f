// ============================================================================
// VIEWS - Cableado de controles DOM hacia el controlador
// ============================================================================
// Solo plumbing: listeners de pestañas, buscador y botón de confirmar, más
// el panel del punto seleccionado. La lógica vive en app.rs.
//
// Los listeners de elementos usan closure.forget(): cuando el elemento se
// destruye el navegador limpia sus listeners, y estos controles se registran
// una sola vez en el arranque.
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Event, HtmlInputElement};

use crate::dom;
use crate::models::point::{service_config, DeliveryPoint, ServiceId};
use crate::services::telegram::HapticStyle;

/// Registrar los listeners de todos los controles
pub fn init_controls(input_debounce_ms: u32) {
    bind_service_tabs();
    bind_search_input(input_debounce_ms);
    bind_select_button();
}

fn bind_service_tabs() {
    for tab in dom::query_selector_all(".delivery-tab") {
        let tab_ref = tab.clone();
        let on_click = Closure::wrap(Box::new(move |_e: Event| {
            for other in dom::query_selector_all(".delivery-tab") {
                dom::remove_class(&other, "active");
            }
            dom::add_class(&tab_ref, "active");

            let Some(service) = tab_ref
                .get_attribute("data-service")
                .and_then(|v| ServiceId::parse(&v))
            else {
                log::warn!("⚠️ Pestaña sin data-service válido");
                return;
            };
            crate::with_app(|app| app.change_service(service));
        }) as Box<dyn FnMut(Event)>);

        if let Err(e) =
            tab.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
        {
            log::warn!("⚠️ No se pudo registrar el listener de pestaña: {:?}", e);
        }
        on_click.forget();
    }
}

fn bind_search_input(debounce_ms: u32) {
    let Some(input) = dom::get_element_by_id("searchInput")
        .and_then(|e| e.dyn_into::<HtmlInputElement>().ok())
    else {
        log::warn!("⚠️ No se encontró #searchInput");
        return;
    };

    // Debounce del tecleo: cada input reemplaza el timer anterior
    let timer: Rc<RefCell<Option<Timeout>>> = Rc::new(RefCell::new(None));

    let input_ref = input.clone();
    let on_input = Closure::wrap(Box::new(move |_e: Event| {
        let query = input_ref.value().trim().to_string();
        let replaced = Timeout::new(debounce_ms, move || {
            crate::with_app(|app| app.search_with_query(&query));
        });
        *timer.borrow_mut() = Some(replaced);
    }) as Box<dyn FnMut(Event)>);

    if let Err(e) = input.add_event_listener_with_callback("input", on_input.as_ref().unchecked_ref())
    {
        log::warn!("⚠️ No se pudo registrar el listener del buscador: {:?}", e);
    }
    on_input.forget();
}

fn bind_select_button() {
    let Some(button) = dom::get_element_by_id("selectButton") else {
        log::warn!("⚠️ No se encontró #selectButton");
        return;
    };

    let on_click = Closure::wrap(Box::new(move |e: Event| {
        e.prevent_default();
        e.stop_propagation();
        crate::with_app(|app| app.submit_clicked());
    }) as Box<dyn FnMut(Event)>);

    if let Err(e) =
        button.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
    {
        log::warn!("⚠️ No se pudo registrar el listener de confirmar: {:?}", e);
    }
    on_click.forget();
}

/// Crear el botón de geolocalización flotante sobre el mapa
pub fn create_geolocation_button() {
    let Some(map_container) = dom::get_element_by_id("map") else {
        return;
    };
    let Ok(button) = dom::create_element("button") else {
        return;
    };

    button.set_class_name("geolocation-button");
    let _ = button.set_attribute("aria-label", "Определить моё местоположение");
    dom::set_inner_html(
        &button,
        r#"
        <svg viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2">
            <circle cx="12" cy="12" r="10"></circle>
            <polygon points="16.24 7.76 14.12 14.12 7.76 16.24 9.88 9.88 16.24 7.76"></polygon>
        </svg>
    "#,
    );

    let button_ref = button.clone();
    let on_click = Closure::wrap(Box::new(move |_e: Event| {
        crate::with_app(|app| app.bridge_haptic(HapticStyle::Medium));
        dom::add_class(&button_ref, "active");

        crate::with_app(|app| app.center_on_user());

        let button_done = button_ref.clone();
        Timeout::new(300, move || {
            dom::remove_class(&button_done, "active");
        })
        .forget();
    }) as Box<dyn FnMut(Event)>);

    if let Err(e) =
        button.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())
    {
        log::warn!("⚠️ No se pudo registrar el botón de geolocalización: {:?}", e);
    }
    on_click.forget();

    let _ = map_container.append_child(&button);
}

/// Pintar el panel del punto seleccionado y mostrarlo
pub fn show_point_info(point: &DeliveryPoint) {
    let config = service_config(point.service);

    if let Some(title) = dom::get_element_by_id("pointTitle") {
        dom::set_text_content(&title, &point.name);
    }
    if let Some(address) = dom::get_element_by_id("pointAddress") {
        dom::set_text_content(&address, &point.address);
    }
    if let Some(icon) = dom::query_selector(".point-icon") {
        dom::set_text_content(&icon, config.icon);
        dom::set_style(
            &icon,
            "background",
            &format!(
                "linear-gradient(135deg, {}20, {}20)",
                config.colors[0], config.colors[1]
            ),
        );
    }

    dom::set_map_full_height(false);
    if let Some(panel) = dom::get_element_by_id("pointInfo") {
        dom::add_class(&panel, "active");
    }
}

/// Ocultar el panel del punto y devolver el mapa a altura completa
pub fn hide_point_info() {
    if let Some(panel) = dom::get_element_by_id("pointInfo") {
        dom::remove_class(&panel, "active");
    }
    dom::set_map_full_height(true);
}

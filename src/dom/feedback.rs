// ============================================================================
// FEEDBACK VISUAL - Toasts, overlay del mapa y loader
// ============================================================================
// Todo camino que muestra el overlay tiene un camino que lo oculta, incluidos
// los de error: la UI nunca queda clavada en "cargando".
// ============================================================================

use gloo_timers::callback::Timeout;

use super::element::{
    add_class, create_element, document, get_element_by_id, query_selector, remove_class,
    set_style, set_text_content,
};

/// Mostrar un toast transitorio en la parte baja de la pantalla
pub fn show_toast(message: &str, duration_ms: u32) {
    // Un toast a la vez
    if let Some(existing) = query_selector(".geolocation-toast") {
        existing.remove();
    }

    let Ok(toast) = create_element("div") else {
        return;
    };
    toast.set_class_name("geolocation-toast");
    set_text_content(&toast, message);

    set_style(&toast, "position", "fixed");
    set_style(&toast, "bottom", "20px");
    set_style(&toast, "left", "50%");
    set_style(&toast, "transform", "translateX(-50%)");
    set_style(&toast, "background-color", "rgba(74, 124, 89, 0.9)");
    set_style(&toast, "color", "white");
    set_style(&toast, "padding", "12px 20px");
    set_style(&toast, "border-radius", "8px");
    set_style(&toast, "box-shadow", "0 4px 12px rgba(0, 0, 0, 0.15)");
    set_style(&toast, "z-index", "10000");
    set_style(&toast, "transition", "opacity 0.3s ease");
    set_style(&toast, "font-size", "14px");
    set_style(&toast, "opacity", "0");

    let Some(body) = document().and_then(|d| d.body()) else {
        return;
    };
    if body.append_child(&toast).is_err() {
        return;
    }

    // Fade-in, espera, fade-out, remove
    let toast_in = toast.clone();
    Timeout::new(10, move || {
        set_style(&toast_in, "opacity", "1");
    })
    .forget();

    Timeout::new(duration_ms, move || {
        set_style(&toast, "opacity", "0");
        Timeout::new(300, move || {
            toast.remove();
        })
        .forget();
    })
    .forget();
}

/// Activar/desactivar el loader de pantalla completa
pub fn set_loader_active(active: bool) {
    if let Some(loader) = get_element_by_id("loader") {
        if active {
            add_class(&loader, "active");
        } else {
            remove_class(&loader, "active");
        }
    }
}

/// Mostrar el overlay del mapa con un mensaje; `dimmed` lo deja translúcido
/// para los refrescos sobre marcadores ya visibles
pub fn show_map_overlay(message: &str, dimmed: bool) {
    if let Some(span) = query_selector(".map-overlay span") {
        set_text_content(&span, message);
    }
    if let Some(overlay) = query_selector(".map-overlay") {
        set_style(&overlay, "display", "flex");
        set_style(&overlay, "opacity", if dimmed { "0.7" } else { "1" });
    }
}

/// Ocultar el overlay del mapa y restaurar su opacidad
pub fn hide_map_overlay() {
    if let Some(overlay) = query_selector(".map-overlay") {
        set_style(&overlay, "display", "none");
        set_style(&overlay, "opacity", "1");
    }
}

/// Ocultar el overlay tras una espera (mensajes informativos como
/// "sin resultados")
pub fn schedule_hide_map_overlay(delay_ms: u32) {
    Timeout::new(delay_ms, hide_map_overlay).forget();
}

/// El mapa ocupa toda la altura cuando no hay panel de punto visible
pub fn set_map_full_height(full: bool) {
    if let Some(map) = get_element_by_id("map") {
        if full {
            add_class(&map, "full-height");
        } else {
            remove_class(&map, "full-height");
        }
    }
}

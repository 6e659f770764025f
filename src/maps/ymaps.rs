// ============================================================================
// YANDEX MAPS FFI - Adaptador sobre el SDK ymaps 2.1
// ============================================================================
// Solo bindings y conversión de datos; la lógica de marcadores vive en
// markers.rs detrás del trait MapPort.
// ============================================================================

use std::collections::HashMap;
use std::rc::Rc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::config::MapViewConfig;
use crate::models::error::AppError;
use crate::models::geo::{Bounds, Coordinate};
use crate::models::point::{service_config, DeliveryPoint, ServiceId};

use super::traits::{MapError, MapPort, MarkerId};

#[wasm_bindgen]
extern "C" {
    /// ymaps.ready(callback)
    #[wasm_bindgen(js_namespace = ymaps, js_name = ready)]
    pub fn ymaps_ready(callback: &js_sys::Function);

    /// ymaps.search(request, options) -> Promise
    #[wasm_bindgen(js_namespace = ymaps, js_name = search)]
    fn ymaps_search(request: &str, options: &JsValue) -> js_sys::Promise;

    #[wasm_bindgen(js_namespace = ymaps, js_name = Map)]
    type YMap;

    #[wasm_bindgen(constructor, js_namespace = ymaps, js_class = "Map")]
    fn new(container: &str, state: &JsValue) -> YMap;

    #[wasm_bindgen(method, js_name = getBounds)]
    fn get_bounds(this: &YMap) -> JsValue;

    #[wasm_bindgen(method, js_name = setCenter)]
    fn set_center(this: &YMap, center: &JsValue, zoom: f64, options: &JsValue);

    #[wasm_bindgen(method, js_name = setBounds)]
    fn set_bounds(this: &YMap, bounds: &JsValue, options: &JsValue);

    #[wasm_bindgen(method, getter, js_name = geoObjects)]
    fn geo_objects(this: &YMap) -> YGeoObjectCollection;

    #[wasm_bindgen(method, getter)]
    fn events(this: &YMap) -> YEventManager;

    type YGeoObjectCollection;

    #[wasm_bindgen(method)]
    fn add(this: &YGeoObjectCollection, child: &Placemark);

    #[wasm_bindgen(method)]
    fn remove(this: &YGeoObjectCollection, child: &Placemark);

    type YEventManager;

    #[wasm_bindgen(method, js_name = add)]
    fn add_listener(this: &YEventManager, types: &JsValue, callback: &js_sys::Function);

    #[wasm_bindgen(js_namespace = ymaps)]
    type Placemark;

    #[wasm_bindgen(constructor, js_namespace = ymaps)]
    fn new(geometry: &JsValue, properties: &JsValue, options: &JsValue) -> Placemark;

    #[wasm_bindgen(method, getter)]
    fn events(this: &Placemark) -> YEventManager;

    #[wasm_bindgen(method, getter)]
    fn options(this: &Placemark) -> YOptionManager;

    type YOptionManager;

    #[wasm_bindgen(method)]
    fn set(this: &YOptionManager, key: &str, value: &JsValue);

    // Resultado de ymaps.search
    type YSearchResult;

    #[wasm_bindgen(method, getter, js_name = geoObjects)]
    fn geo_objects(this: &YSearchResult) -> YGeoObjectList;

    type YGeoObjectList;

    #[wasm_bindgen(method, js_name = getLength)]
    fn get_length(this: &YGeoObjectList) -> u32;

    #[wasm_bindgen(method)]
    fn get(this: &YGeoObjectList, index: u32) -> YGeoObject;

    type YGeoObject;

    #[wasm_bindgen(method, getter)]
    fn geometry(this: &YGeoObject) -> YGeometry;

    #[wasm_bindgen(method, getter)]
    fn properties(this: &YGeoObject) -> YPropertyManager;

    type YGeometry;

    #[wasm_bindgen(method, js_name = getCoordinates)]
    fn get_coordinates(this: &YGeometry) -> JsValue;

    type YPropertyManager;

    #[wasm_bindgen(method, js_name = getAll)]
    fn get_all(this: &YPropertyManager) -> JsValue;
}

#[derive(Serialize)]
struct MapState<'a> {
    center: [f64; 2],
    zoom: f64,
    controls: [&'a str; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlacemarkProperties<'a> {
    balloon_content_header: &'a str,
    balloon_content_body: &'a str,
    hint_content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlacemarkOptions {
    icon_layout: &'static str,
    icon_image_href: String,
    icon_image_size: [i32; 2],
    icon_image_offset: [i32; 2],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchOptions {
    results: u32,
    bounded_by: [[f64; 2]; 2],
    strict_bounds: bool,
}

#[derive(Serialize)]
struct CenterOptions {
    duration: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FitOptions {
    check_zoom_range: bool,
    zoom_margin: u32,
}

#[derive(Deserialize, Default)]
struct HitProperties {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

fn js_err(e: impl std::fmt::Display) -> MapError {
    MapError::Js(e.to_string())
}

/// Icono SVG del pin como data-URL; el estado seleccionado invierte el
/// gradiente del servicio
pub fn delivery_point_icon(service: ServiceId, selected: bool) -> String {
    let config = service_config(service);
    let (color1, color2) = if selected {
        (config.colors[1], config.colors[0])
    } else {
        (config.colors[0], config.colors[1])
    };
    let suffix = if selected { "_selected" } else { "" };
    let gradient_id = format!("pinGradient_{}{}", service.as_str(), suffix);
    let shadow_id = format!("shadow_{}{}", service.as_str(), suffix);

    let svg = format!(
        r##"<svg width="32" height="42" viewBox="0 0 32 42" fill="none" xmlns="http://www.w3.org/2000/svg">
    <defs>
        <linearGradient id="{gradient_id}" x1="0" y1="0" x2="32" y2="42">
            <stop stop-color="{color1}"/>
            <stop offset="1" stop-color="{color2}"/>
        </linearGradient>
        <filter id="{shadow_id}" x="-50%" y="-50%" width="200%" height="200%">
            <feDropShadow dx="0" dy="2" stdDeviation="4" flood-color="rgba(0, 0, 0, 0.3)"/>
        </filter>
    </defs>
    <path d="M16 42C16 42 32 26 32 16C32 7.163 24.837 0 16 0S0 7.163 0 16C0 26 16 42 16 42Z"
          fill="url(#{gradient_id})" filter="url(#{shadow_id})"/>
    <circle cx="16" cy="16" r="8" fill="white"/>
    <text x="16" y="21" text-anchor="middle" font-size="12" fill="{color1}">{icon}</text>
</svg>"##,
        icon = config.icon,
    );

    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

/// Clasificar un rechazo del SDK por su mensaje: los errores de red se
/// reintentan una vez, el resto se absorbe
fn classify_sdk_message(message: String) -> AppError {
    let lower = message.to_lowercase();
    if lower.contains("timeout") {
        AppError::NetworkTimeout
    } else if lower.contains("network") || lower.contains("fetch") {
        AppError::NetworkFailure(message)
    } else {
        AppError::MalformedResponse(message)
    }
}

fn classify_sdk_error(err: JsValue) -> AppError {
    let message = err
        .dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .unwrap_or_else(|| format!("{:?}", err));
    classify_sdk_message(message)
}

/// Búsqueda de lugares acotada al viewport; normaliza cada resultado a
/// DeliveryPoint y descarta los que vengan malformados
pub async fn places_search(
    query: &str,
    bounds: Bounds,
    limit: u32,
    service: ServiceId,
) -> Result<Vec<DeliveryPoint>, AppError> {
    let options = SearchOptions {
        results: limit,
        bounded_by: bounds.to_array(),
        strict_bounds: true,
    };
    let options = serde_wasm_bindgen::to_value(&options)
        .map_err(|e| AppError::MalformedResponse(e.to_string()))?;

    let result = JsFuture::from(ymaps_search(query, &options))
        .await
        .map_err(classify_sdk_error)?;
    let result: YSearchResult = result.unchecked_into();

    let list = result.geo_objects();
    let len = list.get_length();
    let mut points = Vec::with_capacity(len as usize);

    for i in 0..len {
        match hit_to_point(&list.get(i), service) {
            Ok(point) => points.push(point),
            Err(e) => log::warn!("⚠️ Resultado de búsqueda descartado: {}", e),
        }
    }

    log::info!("📍 Búsqueda '{}': {} puntos válidos de {}", query, points.len(), len);
    Ok(points)
}

fn hit_to_point(object: &YGeoObject, service: ServiceId) -> Result<DeliveryPoint, AppError> {
    let coords: [f64; 2] = serde_wasm_bindgen::from_value(object.geometry().get_coordinates())
        .map_err(|e| AppError::MalformedResponse(e.to_string()))?;
    let coordinate = Coordinate::new(coords[0], coords[1])?;

    let props: HitProperties = serde_wasm_bindgen::from_value(object.properties().get_all())
        .unwrap_or_default();
    let name = props
        .name
        .ok_or_else(|| AppError::MalformedResponse("search hit without name".to_string()))?;
    let address = props
        .description
        .or(props.text)
        .or(props.address)
        .unwrap_or_default();

    Ok(DeliveryPoint {
        name,
        address,
        coordinate,
        service,
    })
}

struct MarkerEntry {
    placemark: Placemark,
    service: ServiceId,
    // El closure vive mientras viva el placemark; al quitar el marcador
    // se sueltan ambos y ya no puede llegar ningún click
    _click: Closure<dyn FnMut()>,
}

/// Mapa real respaldado por el SDK de Yandex
pub struct YandexMap {
    map: YMap,
    markers: HashMap<MarkerId, MarkerEntry>,
    on_marker_click: Rc<dyn Fn(MarkerId)>,
}

impl YandexMap {
    /// Crear el mapa centrado en la coordenada inicial
    pub fn create(
        config: &MapViewConfig,
        center: Coordinate,
        on_marker_click: Rc<dyn Fn(MarkerId)>,
    ) -> Result<Self, MapError> {
        let state = MapState {
            center: center.to_lat_lon(),
            zoom: config.initial_zoom,
            controls: ["zoomControl"],
        };
        let state = serde_wasm_bindgen::to_value(&state).map_err(js_err)?;
        let map = YMap::new(&config.container_id, &state);

        log::info!(
            "🗺️ Mapa inicializado en ({}, {})",
            center.latitude(),
            center.longitude()
        );

        Ok(Self {
            map,
            markers: HashMap::new(),
            on_marker_click,
        })
    }

    /// Registrar el handler de movimiento de viewport (boundschange/actionend)
    pub fn on_viewport_event(&self, callback: &Closure<dyn FnMut()>) -> Result<(), MapError> {
        let types = serde_wasm_bindgen::to_value(&["boundschange", "actionend"]).map_err(js_err)?;
        self.map
            .events()
            .add_listener(&types, callback.as_ref().unchecked_ref());
        Ok(())
    }
}

impl MapPort for YandexMap {
    fn insert_marker(
        &mut self,
        id: MarkerId,
        point: &DeliveryPoint,
        selected: bool,
    ) -> Result<(), MapError> {
        let geometry =
            serde_wasm_bindgen::to_value(&point.coordinate.to_lat_lon()).map_err(js_err)?;
        let properties = PlacemarkProperties {
            balloon_content_header: &point.name,
            balloon_content_body: &point.address,
            hint_content: &point.name,
        };
        let properties = serde_wasm_bindgen::to_value(&properties).map_err(js_err)?;
        let options = PlacemarkOptions {
            icon_layout: "default#image",
            icon_image_href: delivery_point_icon(point.service, selected),
            icon_image_size: [32, 42],
            icon_image_offset: [-16, -42],
        };
        let options = serde_wasm_bindgen::to_value(&options).map_err(js_err)?;

        let placemark = Placemark::new(&geometry, &properties, &options);

        let handler = self.on_marker_click.clone();
        let click = Closure::wrap(Box::new(move || handler(id)) as Box<dyn FnMut()>);
        placemark
            .events()
            .add_listener(&JsValue::from_str("click"), click.as_ref().unchecked_ref());

        self.map.geo_objects().add(&placemark);
        self.markers.insert(
            id,
            MarkerEntry {
                placemark,
                service: point.service,
                _click: click,
            },
        );
        Ok(())
    }

    fn remove_marker(&mut self, id: MarkerId) -> Result<(), MapError> {
        let entry = self.markers.remove(&id).ok_or(MapError::UnknownMarker(id))?;
        self.map.geo_objects().remove(&entry.placemark);
        Ok(())
    }

    fn restyle_marker(&mut self, id: MarkerId, selected: bool) -> Result<(), MapError> {
        let entry = self.markers.get(&id).ok_or(MapError::UnknownMarker(id))?;
        entry.placemark.options().set(
            "iconImageHref",
            &JsValue::from_str(&delivery_point_icon(entry.service, selected)),
        );
        Ok(())
    }

    fn set_center(
        &mut self,
        coordinate: Coordinate,
        zoom: f64,
        animated: bool,
    ) -> Result<(), MapError> {
        let center =
            serde_wasm_bindgen::to_value(&coordinate.to_lat_lon()).map_err(js_err)?;
        let options = if animated {
            serde_wasm_bindgen::to_value(&CenterOptions { duration: 500 }).map_err(js_err)?
        } else {
            js_sys::Object::new().into()
        };
        self.map.set_center(&center, zoom, &options);
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: Bounds, margin_px: u32) -> Result<(), MapError> {
        let corners = serde_wasm_bindgen::to_value(&bounds.to_array()).map_err(js_err)?;
        let options = serde_wasm_bindgen::to_value(&FitOptions {
            check_zoom_range: true,
            zoom_margin: margin_px,
        })
        .map_err(js_err)?;
        self.map.set_bounds(&corners, &options);
        Ok(())
    }

    fn viewport(&self) -> Option<Bounds> {
        let corners: [[f64; 2]; 2] =
            serde_wasm_bindgen::from_value(self.map.get_bounds()).ok()?;
        Bounds::from_array(corners).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icon_is_a_base64_data_url() {
        let icon = delivery_point_icon(ServiceId::Sdek, false);
        assert!(icon.starts_with("data:image/svg+xml;base64,"));

        let decoded = STANDARD
            .decode(icon.trim_start_matches("data:image/svg+xml;base64,"))
            .unwrap();
        let svg = String::from_utf8(decoded).unwrap();
        assert!(svg.contains("#00B956"));
        assert!(svg.contains("pinGradient_sdek"));
    }

    #[test]
    fn selected_icon_swaps_gradient() {
        let normal = delivery_point_icon(ServiceId::Boxberry, false);
        let selected = delivery_point_icon(ServiceId::Boxberry, true);
        assert_ne!(normal, selected);

        let decoded = STANDARD
            .decode(selected.trim_start_matches("data:image/svg+xml;base64,"))
            .unwrap();
        let svg = String::from_utf8(decoded).unwrap();
        assert!(svg.contains("pinGradient_boxberry_selected"));
    }

    #[test]
    fn sdk_errors_classified_for_retry() {
        assert!(classify_sdk_message("network error".into()).is_network_class());
        assert!(classify_sdk_message("Failed to fetch".into()).is_network_class());
        assert_eq!(
            classify_sdk_message("request timeout".into()),
            AppError::NetworkTimeout
        );
        assert!(!classify_sdk_message("invalid api key".into()).is_network_class());
    }
}

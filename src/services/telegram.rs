// ============================================================================
// TELEGRAM BRIDGE - Integración con el shell de Telegram WebApp
// ============================================================================
// Wrappers FFI sobre window.Telegram.WebApp + la lógica de envío de la
// selección. El trait HostBridge existe para poder testear el envío con un
// host de mentira.
// ============================================================================

use gloo_timers::callback::Timeout;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::models::error::AppError;
use crate::models::point::{DeliveryPoint, SelectionPayload};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["Telegram", "WebApp"], js_name = ready)]
    fn tg_ready() -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["Telegram", "WebApp"], js_name = expand)]
    fn tg_expand() -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["Telegram", "WebApp"], js_name = showAlert)]
    fn tg_show_alert(message: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["Telegram", "WebApp"], js_name = sendData)]
    fn tg_send_data(data: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["Telegram", "WebApp"], js_name = close)]
    fn tg_close() -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["Telegram", "WebApp"], js_name = onEvent)]
    fn tg_on_event(event: &str, callback: &js_sys::Function) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["Telegram", "WebApp", "HapticFeedback"], js_name = impactOccurred)]
    fn tg_impact_occurred(style: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["Telegram", "WebApp", "HapticFeedback"], js_name = notificationOccurred)]
    fn tg_notification_occurred(kind: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["Telegram", "WebApp", "HapticFeedback"], js_name = selectionChanged)]
    fn tg_selection_changed() -> Result<(), JsValue>;
}

/// Estilo de feedback háptico soportado por el host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticStyle {
    Light,
    Medium,
    Heavy,
    Selection,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Light,
    Dark,
}

/// Lo que el core necesita del shell anfitrión
pub trait HostBridge {
    fn ready(&self);
    fn expand(&self);
    fn color_scheme(&self) -> ColorScheme;
    fn haptic(&self, style: HapticStyle);
    fn show_alert(&self, message: &str);
    fn send_data(&self, payload: &str) -> Result<(), String>;
    /// Pedir al host que cierre la mini-app tras una espera
    fn schedule_close(&self, delay_ms: u32);
}

/// Bridge real sobre window.Telegram.WebApp
#[derive(Clone, Default)]
pub struct TelegramWebApp;

impl TelegramWebApp {
    pub fn new() -> Self {
        Self
    }
}

fn webapp_property(name: &str) -> Option<JsValue> {
    let window = web_sys::window()?;
    let telegram = js_sys::Reflect::get(&window, &JsValue::from_str("Telegram")).ok()?;
    if telegram.is_undefined() {
        return None;
    }
    let webapp = js_sys::Reflect::get(&telegram, &JsValue::from_str("WebApp")).ok()?;
    if webapp.is_undefined() {
        return None;
    }
    js_sys::Reflect::get(&webapp, &JsValue::from_str(name)).ok()
}

fn js_message(err: JsValue) -> String {
    err.dyn_ref::<js_sys::Error>()
        .map(|e| String::from(e.message()))
        .unwrap_or_else(|| format!("{:?}", err))
}

impl HostBridge for TelegramWebApp {
    fn ready(&self) {
        if tg_ready().is_err() {
            log::warn!("⚠️ Telegram.WebApp no disponible (¿fuera de Telegram?)");
        }
    }

    fn expand(&self) {
        let _ = tg_expand();
    }

    fn color_scheme(&self) -> ColorScheme {
        match webapp_property("colorScheme").and_then(|v| v.as_string()) {
            Some(scheme) if scheme == "dark" => ColorScheme::Dark,
            _ => ColorScheme::Light,
        }
    }

    fn haptic(&self, style: HapticStyle) {
        let result = match style {
            HapticStyle::Light => tg_impact_occurred("light"),
            HapticStyle::Medium => tg_impact_occurred("medium"),
            HapticStyle::Heavy => tg_impact_occurred("heavy"),
            HapticStyle::Selection => tg_selection_changed(),
            HapticStyle::Success => tg_notification_occurred("success"),
            HapticStyle::Warning => tg_notification_occurred("warning"),
            HapticStyle::Error => tg_notification_occurred("error"),
        };
        if result.is_err() {
            log::warn!("⚠️ Haptic feedback no soportado en esta plataforma");
        }
    }

    fn show_alert(&self, message: &str) {
        if tg_show_alert(message).is_err() {
            log::warn!("⚠️ showAlert no disponible: {}", message);
        }
    }

    fn send_data(&self, payload: &str) -> Result<(), String> {
        tg_send_data(payload).map_err(js_message)
    }

    fn schedule_close(&self, delay_ms: u32) {
        Timeout::new(delay_ms, || {
            let _ = tg_close();
        })
        .forget();
    }
}

/// Resultado del intento de envío
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Sent,
    NothingSelected,
}

/// Enviar la selección al host.
///
/// Sin punto seleccionado: aviso bloqueante y nada más (el usuario puede
/// corregirlo). Con punto: serializa el payload y lo entrega; un fallo de
/// transporte es terminal para este intento, sin reintento.
pub fn submit_selection(
    bridge: &dyn HostBridge,
    point: Option<&DeliveryPoint>,
    close_delay_ms: u32,
) -> Result<SubmitOutcome, AppError> {
    let Some(point) = point else {
        bridge.show_alert("Пожалуйста, выберите пункт выдачи на карте");
        return Ok(SubmitOutcome::NothingSelected);
    };

    let payload = SelectionPayload::from_point(point);
    let json = serde_json::to_string(&payload)
        .map_err(|e| AppError::SubmissionFailure(e.to_string()))?;

    log::info!("📤 Enviando selección al host: {}", json);

    match bridge.send_data(&json) {
        Ok(()) => {
            bridge.haptic(HapticStyle::Success);
            bridge.schedule_close(close_delay_ms);
            Ok(SubmitOutcome::Sent)
        }
        Err(message) => {
            bridge.haptic(HapticStyle::Error);
            bridge.show_alert(&format!("Ошибка отправки данных: {}", message));
            Err(AppError::SubmissionFailure(message))
        }
    }
}

/// Aplicar el tema del host: en modo oscuro se sobreescriben las variables
/// CSS que usa la hoja de estilos
pub fn apply_theme(bridge: &dyn HostBridge) {
    if bridge.color_scheme() != ColorScheme::Dark {
        return;
    }

    set_css_variable("--off-white", "#1a1a1a");
    set_css_variable("--white", "#2a2a2a");
    set_css_variable("--text-dark", "#e0e0e0");
    set_css_variable("--border", "rgba(255, 255, 255, 0.1)");
}

fn set_css_variable(name: &str, value: &str) {
    let root = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.document_element());

    if let Some(root) = root.and_then(|e| e.dyn_into::<web_sys::HtmlElement>().ok()) {
        if root.style().set_property(name, value).is_err() {
            log::warn!("⚠️ No se pudo establecer la variable CSS {}", name);
        }
    }
}

/// Re-aplicar el tema cuando el host lo cambie.
/// Listener global: se registra UNA sola vez en el arranque.
pub fn watch_theme_changes() {
    let callback = wasm_bindgen::closure::Closure::wrap(Box::new(|| {
        log::info!("🎨 Tema del host cambiado, re-aplicando");
        apply_theme(&TelegramWebApp::new());
    }) as Box<dyn FnMut()>);

    if tg_on_event("themeChanged", callback.as_ref().unchecked_ref()).is_err() {
        log::warn!("⚠️ No se pudo suscribir a themeChanged");
    }
    callback.forget();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::geo::Coordinate;
    use crate::models::point::ServiceId;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Haptic(HapticStyle),
        Alert(String),
        SendData(String),
        ScheduleClose(u32),
    }

    #[derive(Default)]
    struct MockBridge {
        calls: RefCell<Vec<Call>>,
        fail_send: bool,
    }

    impl HostBridge for MockBridge {
        fn ready(&self) {}
        fn expand(&self) {}

        fn color_scheme(&self) -> ColorScheme {
            ColorScheme::Light
        }

        fn haptic(&self, style: HapticStyle) {
            self.calls.borrow_mut().push(Call::Haptic(style));
        }

        fn show_alert(&self, message: &str) {
            self.calls.borrow_mut().push(Call::Alert(message.to_string()));
        }

        fn send_data(&self, payload: &str) -> Result<(), String> {
            if self.fail_send {
                return Err("WebAppDataInvalid".to_string());
            }
            self.calls.borrow_mut().push(Call::SendData(payload.to_string()));
            Ok(())
        }

        fn schedule_close(&self, delay_ms: u32) {
            self.calls.borrow_mut().push(Call::ScheduleClose(delay_ms));
        }
    }

    fn point() -> DeliveryPoint {
        DeliveryPoint {
            name: "ПВЗ Арбат".to_string(),
            address: "ул. Арбат, 12".to_string(),
            coordinate: Coordinate::new(55.7494, 37.5916).unwrap(),
            service: ServiceId::Boxberry,
        }
    }

    #[test]
    fn submit_without_selection_alerts_and_sends_nothing() {
        let bridge = MockBridge::default();
        let outcome = submit_selection(&bridge, None, 300).unwrap();

        assert_eq!(outcome, SubmitOutcome::NothingSelected);
        let calls = bridge.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], Call::Alert(msg) if msg.contains("выберите пункт выдачи")));
    }

    #[test]
    fn successful_submit_sends_payload_then_closes() {
        let bridge = MockBridge::default();
        let p = point();
        let outcome = submit_selection(&bridge, Some(&p), 300).unwrap();

        assert_eq!(outcome, SubmitOutcome::Sent);
        let calls = bridge.calls.borrow();
        assert!(matches!(&calls[0], Call::SendData(json)
            if json.contains("\"service\":\"boxberry\"") && json.contains("ПВЗ Арбат")));
        assert_eq!(calls[1], Call::Haptic(HapticStyle::Success));
        assert_eq!(calls[2], Call::ScheduleClose(300));
    }

    #[test]
    fn failed_submit_haptics_error_and_alerts() {
        let bridge = MockBridge {
            fail_send: true,
            ..MockBridge::default()
        };
        let p = point();
        let result = submit_selection(&bridge, Some(&p), 300);

        assert!(matches!(result, Err(AppError::SubmissionFailure(_))));
        let calls = bridge.calls.borrow();
        assert_eq!(calls[0], Call::Haptic(HapticStyle::Error));
        assert!(matches!(&calls[1], Call::Alert(msg)
            if msg.contains("Ошибка отправки данных") && msg.contains("WebAppDataInvalid")));
        assert!(!calls.iter().any(|c| matches!(c, Call::ScheduleClose(_))));
    }
}

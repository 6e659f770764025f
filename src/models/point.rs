// ============================================================================
// PUNTOS DE RECOGIDA - Servicios, configuración estática y modelo de punto
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::models::geo::Coordinate;

/// Servicio de entrega soportado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceId {
    Sdek,
    Yandex,
    Boxberry,
}

impl ServiceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Sdek => "sdek",
            ServiceId::Yandex => "yandex",
            ServiceId::Boxberry => "boxberry",
        }
    }

    /// Parsear el valor de un atributo data-service
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sdek" => Some(ServiceId::Sdek),
            "yandex" => Some(ServiceId::Yandex),
            "boxberry" => Some(ServiceId::Boxberry),
            _ => None,
        }
    }
}

/// Configuración estática de un servicio: consulta de búsqueda, colores e icono
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    pub query: &'static str,
    pub colors: [&'static str; 2],
    pub icon: &'static str,
    pub display_name: &'static str,
}

const SDEK_CONFIG: ServiceConfig = ServiceConfig {
    query: "Пункт выдачи СДЭК",
    colors: ["#00B956", "#7ED321"],
    icon: "🚚",
    display_name: "СДЭК",
};

const YANDEX_CONFIG: ServiceConfig = ServiceConfig {
    query: "Пункт выдачи Яндекс Маркет",
    colors: ["#FFDB4D", "#FF9500"],
    icon: "🛒",
    display_name: "Яндекс",
};

const BOXBERRY_CONFIG: ServiceConfig = ServiceConfig {
    query: "Пункт выдачи Boxberry",
    colors: ["#8E44AD", "#E74C3C"],
    icon: "📦",
    display_name: "Boxberry",
};

/// Tabla de configuración por servicio (constante de proceso, solo lectura)
pub fn service_config(id: ServiceId) -> &'static ServiceConfig {
    match id {
        ServiceId::Sdek => &SDEK_CONFIG,
        ServiceId::Yandex => &YANDEX_CONFIG,
        ServiceId::Boxberry => &BOXBERRY_CONFIG,
    }
}

/// Punto de recogida obtenido de la búsqueda de lugares
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPoint {
    pub name: String,
    pub address: String,
    pub coordinate: Coordinate,
    pub service: ServiceId,
}

/// Payload serializado que se entrega al host al confirmar la selección
#[derive(Debug, Serialize)]
pub struct SelectionPayload {
    pub service: ServiceId,
    pub name: String,
    pub address: String,
    /// [lat, lon], el orden que usa el SDK de mapas
    pub coordinates: [f64; 2],
}

impl SelectionPayload {
    pub fn from_point(point: &DeliveryPoint) -> Self {
        Self {
            service: point.service,
            name: point.name.clone(),
            address: point.address.clone(),
            coordinates: point.coordinate.to_lat_lon(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_id_roundtrip() {
        for id in [ServiceId::Sdek, ServiceId::Yandex, ServiceId::Boxberry] {
            assert_eq!(ServiceId::parse(id.as_str()), Some(id));
        }
        assert_eq!(ServiceId::parse("dhl"), None);
    }

    #[test]
    fn service_configs_have_distinct_queries() {
        let queries = [
            service_config(ServiceId::Sdek).query,
            service_config(ServiceId::Yandex).query,
            service_config(ServiceId::Boxberry).query,
        ];
        assert_ne!(queries[0], queries[1]);
        assert_ne!(queries[1], queries[2]);
    }

    #[test]
    fn payload_serializes_lowercase_service_and_lat_lon() {
        let point = DeliveryPoint {
            name: "ПВЗ Тверская".into(),
            address: "ул. Тверская, 1".into(),
            coordinate: Coordinate::new(55.7558, 37.6173).unwrap(),
            service: ServiceId::Sdek,
        };
        let json = serde_json::to_string(&SelectionPayload::from_point(&point)).unwrap();
        assert!(json.contains("\"service\":\"sdek\""));
        assert!(json.contains("\"coordinates\":[55.7558,37.6173]"));
        assert!(json.contains("\"name\":\"ПВЗ Тверская\""));
    }
}

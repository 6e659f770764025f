// ============================================================================
// MAP PORT - Contrato con el renderizador de mapas
// ============================================================================

use crate::models::geo::{Bounds, Coordinate};
use crate::models::point::DeliveryPoint;

/// Identificador de marcador dentro del set actual
pub type MarkerId = u64;

/// Operaciones que el gestor de marcadores necesita del mapa.
/// La implementación real envuelve el SDK de Yandex; los tests usan un mock.
pub trait MapPort {
    /// Insertar un marcador en el mapa
    fn insert_marker(
        &mut self,
        id: MarkerId,
        point: &DeliveryPoint,
        selected: bool,
    ) -> Result<(), MapError>;

    /// Quitar un marcador del mapa
    fn remove_marker(&mut self, id: MarkerId) -> Result<(), MapError>;

    /// Cambiar el estilo seleccionado/normal de un marcador existente
    fn restyle_marker(&mut self, id: MarkerId, selected: bool) -> Result<(), MapError>;

    /// Centrar el mapa en una coordenada
    fn set_center(
        &mut self,
        coordinate: Coordinate,
        zoom: f64,
        animated: bool,
    ) -> Result<(), MapError>;

    /// Ajustar la vista a unos bounds con margen en píxeles
    fn fit_bounds(&mut self, bounds: Bounds, margin_px: u32) -> Result<(), MapError>;

    /// Región visible actual, si el mapa puede informarla
    fn viewport(&self) -> Option<Bounds>;
}

/// Error del mapa
#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    NotReady,
    UnknownMarker(MarkerId),
    Js(String),
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::NotReady => write!(f, "Map is not ready"),
            MapError::UnknownMarker(id) => write!(f, "Unknown marker id {}", id),
            MapError::Js(msg) => write!(f, "Map SDK error: {}", msg),
        }
    }
}

impl std::error::Error for MapError {}

// ============================================================================
// MAPS MODULE - Contrato del mapa, gestor de marcadores y adaptador Yandex
// ============================================================================

pub mod markers;
pub mod traits;
pub mod ymaps;

pub use markers::{ApplyOutcome, MarkerSetManager};
pub use traits::{MapError, MapPort, MarkerId};
pub use ymaps::YandexMap;

// ============================================================================
// SESSION STATE - Estado de la sesión actual
// ============================================================================
// Vive dentro del App global; todo se muta desde el event loop principal.
// ============================================================================

use crate::models::geo::Coordinate;
use crate::models::point::ServiceId;
use crate::services::geolocation::PermissionState;

pub struct SessionState {
    /// Servicio de entrega activo (pestaña seleccionada)
    pub current_service: ServiceId,
    /// Resultado del último intento de geolocalización
    pub permission: PermissionState,
    /// Última ubicación conocida del usuario, cacheada para los fallbacks
    pub user_location: Option<Coordinate>,
    /// El mapa ya se asentó: las búsquedas por viewport están habilitadas
    pub map_ready: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            current_service: ServiceId::Sdek,
            permission: PermissionState::Unknown,
            user_location: None,
            map_ready: false,
        }
    }

    pub fn set_permission(&mut self, permission: PermissionState) {
        if self.permission != permission {
            log::info!("🔐 Permiso de geolocalización: {:?}", permission);
            self.permission = permission;
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

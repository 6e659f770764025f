/// API key de Yandex Maps
/// Configurada en tiempo de compilación via YMAPS_API_KEY (ver build.rs);
/// vacía por defecto, el SDK funciona en modo de desarrollo sin key.
pub const YMAPS_API_KEY: &str = match option_env!("YMAPS_API_KEY") {
    Some(key) => key,
    None => "",
};

/// Flag de sesión: el usuario ya concedió (o denegó) la geolocalización
pub const GEOLOCATION_PERMITTED_KEY: &str = "geolocation_permitted";

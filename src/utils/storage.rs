use serde::{de::DeserializeOwned, Serialize};
use web_sys::{window, Storage};

/// Acceso a sessionStorage: el único estado que sobrevive entre vistas
/// de la mini-app es de alcance sesión, nunca persistente.
pub fn get_session_storage() -> Option<Storage> {
    window()?.session_storage().ok()?
}

pub fn save_to_session<T: Serialize>(key: &str, value: &T) -> Result<(), String> {
    let storage = get_session_storage().ok_or("No se pudo acceder a sessionStorage")?;
    let json = serde_json::to_string(value)
        .map_err(|e| format!("Error serializando datos: {}", e))?;
    storage.set_item(key, &json)
        .map_err(|_| "Error guardando en sessionStorage".to_string())?;
    Ok(())
}

pub fn load_from_session<T: DeserializeOwned>(key: &str) -> Option<T> {
    let storage = get_session_storage()?;
    let json = storage.get_item(key).ok()??;
    serde_json::from_str(&json).ok()
}

pub fn remove_from_session(key: &str) -> Result<(), String> {
    let storage = get_session_storage().ok_or("No se pudo acceder a sessionStorage")?;
    storage.remove_item(key)
        .map_err(|_| "Error eliminando de sessionStorage".to_string())?;
    Ok(())
}

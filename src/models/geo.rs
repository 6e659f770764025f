// ============================================================================
// GEO - Coordenadas, bounds y distancias
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::models::error::AppError;

/// Radio medio de la Tierra en kilómetros
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Centro por defecto cuando falla toda la resolución de ubicación (Moscú)
pub const DEFAULT_CITY_CENTER: Coordinate = Coordinate {
    latitude: 55.7558,
    longitude: 37.6173,
};

/// Coordenada geográfica validada (inmutable)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Crear coordenada validando rangos: lat ∈ [-90, 90], lon ∈ [-180, 180]
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, AppError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(AppError::MalformedResponse(format!(
                "non-finite coordinate ({latitude}, {longitude})"
            )));
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::MalformedResponse(format!(
                "coordinate out of range ({latitude}, {longitude})"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Par [lat, lon] en el orden que espera el SDK de mapas
    pub fn to_lat_lon(&self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            latitude: f64,
            longitude: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        Coordinate::new(raw.latitude, raw.longitude).map_err(serde::de::Error::custom)
    }
}

/// Región visible del mapa: esquinas suroeste y noreste
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    south_west: Coordinate,
    north_east: Coordinate,
}

impl Bounds {
    pub fn new(south_west: Coordinate, north_east: Coordinate) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    pub fn south_west(&self) -> Coordinate {
        self.south_west
    }

    pub fn north_east(&self) -> Coordinate {
        self.north_east
    }

    /// Forma [[lat, lon], [lat, lon]] del SDK de mapas
    pub fn to_array(&self) -> [[f64; 2]; 2] {
        [self.south_west.to_lat_lon(), self.north_east.to_lat_lon()]
    }

    pub fn from_array(corners: [[f64; 2]; 2]) -> Result<Self, AppError> {
        Ok(Self {
            south_west: Coordinate::new(corners[0][0], corners[0][1])?,
            north_east: Coordinate::new(corners[1][0], corners[1][1])?,
        })
    }

    /// Dos bounds son similares si cada componente difiere menos que epsilon
    pub fn is_similar(&self, other: &Bounds, epsilon_deg: f64) -> bool {
        (self.south_west.latitude - other.south_west.latitude).abs() < epsilon_deg
            && (self.south_west.longitude - other.south_west.longitude).abs() < epsilon_deg
            && (self.north_east.latitude - other.north_east.latitude).abs() < epsilon_deg
            && (self.north_east.longitude - other.north_east.longitude).abs() < epsilon_deg
    }

    /// Bounds mínimos que contienen todas las coordenadas dadas
    pub fn enclosing(coordinates: &[Coordinate]) -> Option<Self> {
        let first = coordinates.first()?;
        let mut min_lat = first.latitude;
        let mut max_lat = first.latitude;
        let mut min_lon = first.longitude;
        let mut max_lon = first.longitude;

        for c in &coordinates[1..] {
            min_lat = min_lat.min(c.latitude);
            max_lat = max_lat.max(c.latitude);
            min_lon = min_lon.min(c.longitude);
            max_lon = max_lon.max(c.longitude);
        }

        Some(Self {
            south_west: Coordinate {
                latitude: min_lat,
                longitude: min_lon,
            },
            north_east: Coordinate {
                latitude: max_lat,
                longitude: max_lon,
            },
        })
    }
}

/// Distancia haversine entre dos coordenadas, en kilómetros
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = coord(55.7558, 37.6173);
        let b = coord(48.8566, 2.3522);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let a = coord(55.7558, 37.6173);
        assert_eq!(haversine_km(a, a), 0.0);
    }

    #[test]
    fn haversine_moscow_example() {
        // Resultado IP (55.7558, 37.6173) vs resultado del navegador
        // (55.80, 37.70): varios km, muy por encima del umbral de 0.5 km
        let ip = coord(55.7558, 37.6173);
        let browser = coord(55.80, 37.70);
        let d = haversine_km(ip, browser);
        assert!(d > 0.5);
        assert!((d - 7.13).abs() < 0.3, "distancia inesperada: {d}");
    }

    #[test]
    fn haversine_known_city_pair() {
        // Moscú ↔ San Petersburgo, unos 634 km
        let moscow = coord(55.7558, 37.6173);
        let spb = coord(59.9343, 30.3351);
        let d = haversine_km(moscow, spb);
        assert!((d - 634.0).abs() < 5.0, "distancia inesperada: {d}");
    }

    #[test]
    fn coordinate_rejects_out_of_range() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(-91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, 181.0).is_err());
        assert!(Coordinate::new(0.0, -181.0).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(90.0, -180.0).is_ok());
    }

    #[test]
    fn bounds_similar_below_threshold() {
        // Todos los deltas por debajo del umbral de 0.01 grados
        let a = Bounds::from_array([[55.70, 37.55], [55.80, 37.70]]).unwrap();
        let b = Bounds::from_array([[55.7005, 37.5505], [55.8005, 37.7005]]).unwrap();
        assert!(a.is_similar(&b, 0.01));
    }

    #[test]
    fn bounds_not_similar_when_one_edge_moves() {
        let a = Bounds::from_array([[55.70, 37.55], [55.80, 37.70]]).unwrap();
        let b = Bounds::from_array([[55.70, 37.55], [55.80, 37.72]]).unwrap();
        assert!(!a.is_similar(&b, 0.01));
    }

    #[test]
    fn enclosing_covers_all_points() {
        let points = [coord(55.70, 37.60), coord(55.75, 37.55), coord(55.72, 37.65)];
        let bounds = Bounds::enclosing(&points).unwrap();
        assert_eq!(bounds.south_west().latitude(), 55.70);
        assert_eq!(bounds.south_west().longitude(), 37.55);
        assert_eq!(bounds.north_east().latitude(), 55.75);
        assert_eq!(bounds.north_east().longitude(), 37.65);
    }

    #[test]
    fn enclosing_empty_is_none() {
        assert!(Bounds::enclosing(&[]).is_none());
    }
}

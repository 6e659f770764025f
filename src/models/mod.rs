pub mod error;
pub mod geo;
pub mod point;

pub use error::AppError;
pub use geo::{haversine_km, Bounds, Coordinate, DEFAULT_CITY_CENTER};
pub use point::{service_config, DeliveryPoint, SelectionPayload, ServiceConfig, ServiceId};

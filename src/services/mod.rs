pub mod geolocation;
pub mod search;
pub mod telegram;

pub use geolocation::{LocateError, LocationSource, PermissionState, Resolution};
pub use search::SearchThrottle;
pub use telegram::{submit_selection, HapticStyle, HostBridge, SubmitOutcome, TelegramWebApp};

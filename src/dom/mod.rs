// ============================================================================
// DOM MODULE - Helpers para manipulación DOM y feedback visual
// ============================================================================

pub mod element;
pub mod feedback;

pub use element::*;
pub use feedback::*;

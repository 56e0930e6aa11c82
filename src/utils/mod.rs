//! Utilidades del sistema
//!
//! Este módulo contiene el manejo de errores HTTP y las métricas.

pub mod errors;
pub mod metrics;

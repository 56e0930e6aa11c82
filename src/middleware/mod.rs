//! Middleware del sistema
//!
//! Este módulo contiene la configuración de CORS del proxy.

pub mod cors;

pub use cors::*;

//! Services module
//!
//! Este módulo contiene la lógica de negocio: el cache read-through que
//! coordina almacén y upstream.

pub mod photo_cache_service;

pub use photo_cache_service::*;

//! Photo cache proxy
//!
//! Proxy HTTP con cache read-through delante de una API JSON de fotos.
//! Sirve copias cacheadas cuando existen y, en un miss, consulta el upstream
//! y puebla el cache para las siguientes peticiones.

pub mod api;
pub mod cache;
pub mod clients;
pub mod config;
pub mod middleware;
pub mod services;
pub mod state;
pub mod utils;

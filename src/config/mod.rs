//! Configuración del proyecto
//!
//! Este módulo contiene la lectura de variables de entorno del proxy.

pub mod environment;

pub use environment::*;

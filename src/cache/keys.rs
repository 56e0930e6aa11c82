//! Nombres de claves del cache

/// Generador de claves con prefijo opcional
#[derive(Debug, Clone, Default)]
pub struct CacheKeys {
    namespace: Option<String>,
}

impl CacheKeys {
    pub fn new(namespace: Option<String>) -> Self {
        let namespace = namespace
            .map(|ns| ns.trim().trim_end_matches(':').to_string())
            .filter(|ns| !ns.is_empty());
        Self { namespace }
    }

    fn make_key(&self, key: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:{}", ns, key),
            None => key.to_string(),
        }
    }

    /// Clave de la colección completa
    pub fn collection(&self) -> String {
        self.make_key("photos")
    }

    /// Clave independiente de un item. El identificador se usa tal cual.
    pub fn item(&self, id: &str) -> String {
        self.make_key(&format!("item:{}", id))
    }

    /// Hash que agrupa todos los items (estrategia `hash`)
    pub fn item_hash(&self) -> String {
        self.make_key("photos:hash")
    }
}

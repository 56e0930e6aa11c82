use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use photo_cache_proxy::api;
use photo_cache_proxy::cache::{self, redis_client::mask_url};
use photo_cache_proxy::clients::HttpPhotosClient;
use photo_cache_proxy::config::EnvironmentConfig;
use photo_cache_proxy::services::PhotoCacheService;
use photo_cache_proxy::state::AppState;
use photo_cache_proxy::utils::metrics::CacheMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("📷 Photo Cache Proxy");
    info!("====================");

    let config = EnvironmentConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Configuración inválida: {}", e))?;

    // Sin almacén no se arranca
    let store = match cache::connect(&config.store).await {
        Ok(store) => store,
        Err(e) => {
            error!("❌ Error conectando al almacén {}: {}", mask_url(&config.store.redis_url), e);
            return Err(anyhow::anyhow!("Error de almacén: {}", e));
        }
    };

    let upstream = HttpPhotosClient::new(&config.upstream)?;
    let metrics = CacheMetrics::new()?;
    let service = PhotoCacheService::new(
        store.clone(),
        Arc::new(upstream),
        config.cache.clone(),
        metrics,
    );
    let app_state = AppState::new(service);
    let app = api::create_app(app_state.clone(), &config.cors_origins);

    let addr: SocketAddr = config.server_addr().parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔁 Upstream: {} (timeout {:?})", config.upstream.base_url, config.upstream.timeout);
    info!(
        "🗄️ Cache: backend {}, TTL {}s, claves {:?}, escritura {:?}, coalescing {}",
        store.backend(),
        config.cache.ttl_seconds,
        config.cache.key_strategy,
        config.cache.write_policy,
        config.cache.coalesce
    );
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /photos - Colección completa");
    info!("   GET  /photos/:id - Foto individual");
    info!("   GET  /health - Estado del proxy y del almacén");
    info!("   GET  /metrics - Métricas Prometheus");

    // Iniciar servidor en background
    let server_handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                error!("❌ Error del servidor: {}", e);
                e
            })
    });

    // Esperar a que el servidor termine
    let served = server_handle.await?;

    // Drenar escrituras pendientes y liberar la conexión una sola vez
    app_state.photos.drain(config.cache.shutdown_grace).await;
    if let Err(e) = store.shutdown().await {
        error!("❌ Error cerrando el almacén: {}", e);
    }

    if let Err(e) = served {
        error!("❌ Servidor terminó con error: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}

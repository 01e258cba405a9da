use anyhow::Context;
use sotaria_api::config::SotariaConfig;
use sotaria_api::registry::{
    BindingDirectory, MemoryProjectStore, NamespaceDirectory, ProjectRegistry,
};
use sotaria_api::shutdown::ShutdownCoordinator;
use sotaria_api::{api, logging, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SotariaConfig::load().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let _log_guard = logging::init(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    info!("Starting Sotaria apiserver v{}", env!("CARGO_PKG_VERSION"));

    let (namespaces, bindings) = directories(&config).await?;
    let registry = ProjectRegistry::new(Arc::new(MemoryProjectStore::new()), namespaces, bindings);
    let state = Arc::new(AppState::new(config.clone(), registry));

    let app = api::router(state);

    let shutdown = ShutdownCoordinator::new();
    let signal_waiter = shutdown.clone();
    tokio::spawn(async move { signal_waiter.wait_for_signal().await });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Sotaria apiserver listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

#[cfg(feature = "kubernetes")]
async fn directories(
    config: &SotariaConfig,
) -> anyhow::Result<(Arc<dyn NamespaceDirectory>, Arc<dyn BindingDirectory>)> {
    use sotaria_api::registry::kubernetes::{build_client, KubeBindingDirectory, KubeNamespaceDirectory};

    let client = build_client(
        config.kubernetes.kubeconfig.as_deref(),
        config.kubernetes.context.as_deref(),
    )
    .await?;

    let namespaces = Arc::new(KubeNamespaceDirectory::spawn(client.clone()));
    let bindings = Arc::new(KubeBindingDirectory::spawn(client));

    let timeout = config.kubernetes.sync_timeout();
    info!(timeout_secs = timeout.as_secs(), "Waiting for directory caches to sync");
    let (ns_synced, rb_synced) = tokio::join!(
        namespaces.wait_synced(timeout),
        bindings.wait_synced(timeout)
    );
    for result in [ns_synced, rb_synced] {
        if let Err(e) = result {
            tracing::warn!(error = %e, "Directory not synced at startup; readiness will report it");
        }
    }

    Ok((
        namespaces as Arc<dyn NamespaceDirectory>,
        bindings as Arc<dyn BindingDirectory>,
    ))
}

#[cfg(not(feature = "kubernetes"))]
async fn directories(
    _config: &SotariaConfig,
) -> anyhow::Result<(Arc<dyn NamespaceDirectory>, Arc<dyn BindingDirectory>)> {
    use sotaria_api::registry::{MemoryBindingDirectory, MemoryNamespaceDirectory};

    tracing::warn!("Built without Kubernetes support; serving empty in-memory directories");
    let namespaces: Arc<dyn NamespaceDirectory> = Arc::new(MemoryNamespaceDirectory::new());
    let bindings: Arc<dyn BindingDirectory> = Arc::new(MemoryBindingDirectory::new());
    Ok((namespaces, bindings))
}

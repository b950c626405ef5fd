use anyhow::{Context, Result};
use facematch::{create_router, init, AppState, Config};

use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    init().context("Failed to initialize logging")?;

    let config = Config::from_env().context("Invalid configuration")?;
    let addr = config.bind_addr;

    let state = AppState::with_config(config).context("Failed to load models and catalog")?;
    state.prepare_dirs().context("Failed to create upload directories")?;

    // Warm the catalog cache; requests arriving first wait on the same
    // computation.
    let warm = Arc::clone(&state);
    tokio::task::spawn_blocking(move || {
        let count = warm.catalog.get_or_build(warm.embedder.as_ref()).len();
        if count == 0 {
            log::warn!(
                "Animal catalog is empty; add images under {}",
                warm.config.catalog_dir.display()
            );
        }
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    log::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

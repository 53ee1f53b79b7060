use crate::config::Config;
use crate::model::{Model, OrtModel};
use crate::server::HttpServer;

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    // The service stays up without a model and answers placeholder
    // predictions until the artifact is redeployed.
    let model: Option<Arc<dyn Model>> = match OrtModel::load(&config.model) {
        Ok(model) => {
            tracing::info!("Model loaded from {:?}", config.model.get_model_path());
            Some(Arc::new(model))
        }
        Err(e) => {
            tracing::error!("Failed to load model: {:?}", e);
            tracing::warn!("Serving placeholder predictions until a model is available");
            None
        }
    };

    let server = HttpServer::new(model, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_shutdown_rx = shutdown_tx.subscribe();

    let server_handle = server.run(server_shutdown_rx).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    let _ = server_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use dormrota::access::Actor;
use dormrota::config::Config;
use dormrota::console::Console;
use dormrota::tenant::TenantManager;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the JSON replies, so logs go to stderr.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env();
    dormrota::observability::init(config.metrics_port)?;
    std::fs::create_dir_all(&config.data_dir)?;

    let tenants = Arc::new(TenantManager::new(config.data_dir.clone(), config.compact_threshold));
    // Load the tenant up front so a bad data dir fails before reading input.
    tenants.get_or_create(&config.tenant)?;
    let console = Console::new(tenants, config.tenant.clone(), Actor::new(config.role));

    info!("dormrota ready");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  tenant: {}", config.tenant);
    info!("  role: {}", config.role);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to register SIGTERM handler: {e}");
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("end of input");
                    break;
                };
                if let Some(reply) = console.handle_line(&line).await {
                    let mut out = serde_json::to_vec(&reply)?;
                    out.push(b'\n');
                    stdout.write_all(&out).await?;
                    stdout.flush().await?;
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    info!("dormrota stopped");
    Ok(())
}

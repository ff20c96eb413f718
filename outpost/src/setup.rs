//! Startup helpers: config banner and signal handling.

use outpost_config::{Config, StorePlace};

/// Logs the effective configuration at startup.
///
/// Secrets are reported by presence only.
pub fn dump_config(command: &str, config: &Config) {
    outpost_log::info!("outpost {command} starting");
    outpost_log::info!("  address: {}", config.address());
    if let Some(grpc) = config.grpc_address() {
        outpost_log::info!("  grpc address: {grpc}");
    }
    outpost_log::info!("  payload hashing: {}", on_off(config.hash_key().is_some()));
    outpost_log::info!("  payload encryption: {}", on_off(config.crypto_key().is_some()));

    match command {
        "server" => {
            let store = match config.store_place() {
                StorePlace::Memory => "memory".to_owned(),
                StorePlace::File(path) => format!("file ({})", path.display()),
                StorePlace::Database(_) => "database".to_owned(),
            };
            outpost_log::info!("  store: {store}");
            outpost_log::info!("  store interval: {:?}", config.store_interval());
            outpost_log::info!("  restore: {}", config.restore());
            match config.trusted_subnet() {
                Some(subnet) => outpost_log::info!("  trusted subnet: {subnet}"),
                None => outpost_log::info!("  trusted subnet: off"),
            }
        }
        "agent" => {
            outpost_log::info!("  poll interval: {:?}", config.poll_interval());
            outpost_log::info!("  report interval: {:?}", config.report_interval());
            outpost_log::info!("  rate limit: {}", config.rate_limit());
        }
        _ => {}
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Blocks until SIGINT, SIGTERM or SIGQUIT.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
        _ = quit.recv() => {}
    }

    Ok(())
}

/// Blocks until Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

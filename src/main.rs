use std::time::{SystemTime, UNIX_EPOCH};

use forward_plus::{Application, RendererConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("[MAIN] Starting Forward+ demo");

    let light_seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let config = RendererConfig {
        window_title: "Forward+ Demo (wgpu)".to_string(),
        window_width: 1024,
        window_height: 768,
        light_seed,
        debug_overlay: false,
    };
    log::info!("[MAIN] Config: {:?}", config);

    let application = Application::new(config);
    match application.run() {
        Ok(()) => {
            log::info!("[MAIN] Exited normally");
        }
        Err(e) => {
            log::error!("[MAIN] Fatal error: {}", e);
            eprintln!("Fatal error: {}", e);
            std::process::exit(1);
        }
    }
}

//! `launchdeck server` - Start the launchdeck HTTP backend server.

use launchdeck_core::config::LaunchdeckConfig;

pub async fn run(host: String, port: u16, launchdeck: LaunchdeckConfig) -> Result<(), String> {
    let config = launchdeck_server::ServerConfig {
        host: host.clone(),
        port,
        launchdeck,
    };

    println!("Starting launchdeck server on {}:{}...", host, port);

    let addr = launchdeck_server::start_server(config).await?;
    println!("launchdeck server listening on http://{}", addr);

    // Keep the process running until interrupted
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}

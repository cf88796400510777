//! `eva server` — Start the Eva HTTP backend server.

use eva_server::ServerConfig;

pub async fn run(config: ServerConfig) -> Result<(), String> {
    println!("Starting Eva server on {}:{}...", config.host, config.port);

    let addr = eva_server::start_server(config).await?;
    println!("Eva server listening on http://{}", addr);

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for Ctrl+C: {}", e))?;

    println!("\nShutting down...");
    Ok(())
}

use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::error::ConfigError;
use server::logic::{LogicFactory, SANDBOX_LOGIC};
use server::network::Server;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Name shown in the startup log
    #[clap(long, default_value = "Replication Server")]
    name: String,
    /// Maximum number of connected players
    #[clap(short, long, default_value = "8")]
    max_connections: usize,
    /// Physics steps per second
    #[clap(long, default_value = "60")]
    physics_fps: f32,
    /// Object state broadcasts per second
    #[clap(long, default_value = "20")]
    send_gamestate_fps: f32,
    /// Incoming packet drains per second
    #[clap(long, default_value = "100")]
    network_fps: f32,
    /// Input samples a player may buffer before the queue is collapsed
    #[clap(long, default_value = "10")]
    max_input_deque_size: usize,
    /// Seconds of silence before a player is dropped
    #[clap(long, default_value = "10")]
    client_timeout: u64,
    /// Remote administration password, empty disables rcon
    #[clap(long, default_value = "")]
    rcon_password: String,
    /// Send a correction on every consumed input instead of every other one
    #[clap(long)]
    no_network_optimizations: bool,
    /// Level loaded at startup
    #[clap(short, long, default_value = "arena")]
    level: String,
    /// Game logic type of the startup level
    #[clap(long, default_value = SANDBOX_LOGIC)]
    logic: String,
    /// Do not read administrator commands from stdin
    #[clap(long)]
    no_console: bool,
}

impl Args {
    fn to_config(&self) -> Result<ServerConfig, ConfigError> {
        let config = ServerConfig {
            listen_addr: format!("{}:{}", self.host, self.port),
            server_name: self.name.clone(),
            max_connections: self.max_connections,
            physics_fps: self.physics_fps,
            send_gamestate_fps: self.send_gamestate_fps,
            network_fps: self.network_fps,
            max_input_deque_size: self.max_input_deque_size,
            client_timeout_secs: self.client_timeout,
            rcon_password: self.rcon_password.clone(),
            network_optimizations: !self.no_network_optimizations,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parses command-line arguments, loads the startup level and runs the server loop.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.to_config()?;

    info!(
        "Starting server: {} players max, {} Hz physics, {} Hz state, rcon {}",
        config.max_connections,
        config.physics_fps,
        config.send_gamestate_fps,
        if config.rcon_enabled() { "enabled" } else { "disabled" }
    );

    let mut server = Server::new(config, LogicFactory::default()).await?;

    if let Err(e) = server.driver_mut().load_level(&args.level, &args.logic) {
        error!("Could not load startup level: {}", e);
        return Err(e.into());
    }
    if !args.no_console {
        server.spawn_console_reader();
    }

    server.run().await
}

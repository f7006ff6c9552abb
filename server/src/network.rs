//! Server network layer handling UDP communications and loop coordination

use crate::config::ServerConfig;
use crate::driver::{Outgoing, ReplicationDriver, ServerEvent};
use crate::logic::LogicFactory;
use log::{debug, error, info, warn};
use shared::MAX_FRAME_SIZE;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { data: Vec<u8>, addr: SocketAddr },
    ConsoleLine(String),
    Shutdown,
}

/// Main server coordinating networking and the replication driver
pub struct Server {
    socket: Arc<UdpSocket>,
    driver: ReplicationDriver,
    config: ServerConfig,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outgoing_rx: Option<mpsc::UnboundedReceiver<Outgoing>>,
    pending: Vec<(Vec<u8>, SocketAddr)>,
}

impl Server {
    pub async fn new(
        config: ServerConfig,
        logic_factory: LogicFactory,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        let socket = Arc::new(UdpSocket::bind(&config.listen_addr).await?);
        info!(
            "{} listening on {}",
            config.server_name,
            socket.local_addr()?
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            driver: ReplicationDriver::new(config.clone(), logic_factory, outgoing_tx),
            config,
            server_tx,
            server_rx,
            outgoing_rx: Some(outgoing_rx),
            pending: Vec::new(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn driver(&self) -> &ReplicationDriver {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut ReplicationDriver {
        &mut self.driver
    }

    /// Handle for feeding the loop from outside, e.g. to request shutdown.
    pub fn sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming datagrams
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_FRAME_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let data = buffer[..len].to_vec();
                        if let Err(e) = server_tx.send(ServerMessage::PacketReceived { data, addr })
                        {
                            error!("Failed to send packet to main loop: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that writes frames queued by the driver to the socket
    fn spawn_network_sender(&mut self) {
        let Some(mut outgoing_rx) = self.outgoing_rx.take() else {
            warn!("Network sender already running");
            return;
        };
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            while let Some(outgoing) = outgoing_rx.recv().await {
                if let Err(e) = socket.send_to(&outgoing.frame, outgoing.addr).await {
                    error!("Failed to send packet to {}: {}", outgoing.addr, e);
                }
            }
        });
    }

    /// Spawns task that forwards administrator lines typed on stdin
    pub fn spawn_console_reader(&self) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        if server_tx.send(ServerMessage::ConsoleLine(line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Console input unavailable: {}", e);
                        break;
                    }
                }
            }
        });
    }

    // Datagrams are buffered between drains so that handling happens at
    // the configured network rate.
    fn drain_packets(&mut self) {
        for (data, addr) in std::mem::take(&mut self.pending) {
            self.driver.handle_packet(addr, &data);
        }
    }

    fn log_events(&mut self) {
        for event in self.driver.take_events() {
            match event {
                ServerEvent::PlayerJoined(addr) => info!("Player {} joined", addr),
                ServerEvent::PlayerLeft(addr) => info!("Player {} left", addr),
                ServerEvent::LevelLoaded {
                    level_name,
                    logic_type,
                } => info!("Level {} ({}) loaded", level_name, logic_type),
                ServerEvent::ExceptionCaught(e) => debug!("Recovered from: {}", e),
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut physics_interval = interval(self.config.physics_interval());
        let mut gamestate_interval = interval(self.config.gamestate_interval());
        let mut network_interval = interval(self.config.network_interval());
        let mut housekeeping_interval = interval(Duration::from_secs(1));
        for ticker in [
            &mut physics_interval,
            &mut gamestate_interval,
            &mut network_interval,
        ] {
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        }

        let dt = self.config.physics_dt();
        let mut last_report = Instant::now();
        let mut frames: u32 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { data, addr }) => {
                            self.pending.push((data, addr));
                        }
                        Some(ServerMessage::ConsoleLine(line)) => {
                            let response = self.driver.execute_console(&line);
                            println!("{}", response);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                _ = network_interval.tick() => {
                    self.drain_packets();
                }

                _ = physics_interval.tick() => {
                    self.driver.frame_move(dt);
                    frames += 1;
                }

                _ = gamestate_interval.tick() => {
                    self.driver.send_game_state();
                }

                _ = housekeeping_interval.tick() => {
                    self.driver.remove_timed_out();
                    self.driver.decay_annoying_requests();

                    if !self.driver.registry().is_empty() {
                        let elapsed = last_report.elapsed().as_secs_f32();
                        debug!(
                            "Tick {}: {} players, {:.1} frames/s",
                            self.driver.game_state().tick,
                            self.driver.registry().len(),
                            frames as f32 / elapsed.max(f32::EPSILON)
                        );
                    }
                    last_report = Instant::now();
                    frames = 0;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, shutting down");
                    break;
                }
            }

            self.log_events();
        }

        let players = self.driver.registry().ids();
        for addr in players {
            self.driver.kick(addr);
        }
        // Let the sender flush the kicks before the runtime goes away.
        tokio::time::sleep(Duration::from_millis(50)).await;

        Ok(())
    }
}

//! Performance benchmarks for the hot replication paths

use server::config::ServerConfig;
use server::driver::ReplicationDriver;
use server::input_queue::{InputQueue, QueuePolicy};
use server::logic::{LogicFactory, SANDBOX_LOGIC};
use server::utils::get_timestamp;
use shared::{ClientCommand, PlayerInput, ServerCommand, StateKind};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// Benchmarks encoding and decoding of player input frames
#[test]
fn benchmark_input_codec() {
    let command = ClientCommand::PlayerInput {
        timestamp: 123_456,
        sequence: 42,
        input: PlayerInput {
            up: true,
            right: true,
            delta_yaw: 0.1,
            ..Default::default()
        },
    };

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = command.encode().unwrap();
        let _ = ClientCommand::decode(&frame).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Input codec: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second for 100k iterations
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks state frame encoding
#[test]
fn benchmark_state_encoding() {
    let command = ServerCommand::SetGameObjectState {
        timestamp: 99,
        kind: StateKind::Core,
        id: 7,
        state: vec![0u8; 16],
    };

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = command.encode().unwrap();
    }

    let duration = start.elapsed();
    println!(
        "State encoding: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks steady input queue churn at one sample per step
#[test]
fn benchmark_input_queue() {
    let mut queue = InputQueue::new(QueuePolicy::default());
    let iterations: u32 = 100_000;
    let start = Instant::now();

    queue.enqueue(0, PlayerInput::default());
    for i in 1..=iterations {
        queue.enqueue(i as u8, PlayerInput::default());
        let _ = queue.advance_one_tick(0.05);
    }

    let duration = start.elapsed();
    println!(
        "Input queue: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(queue.len(), 1);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks full server frames with a crowded roster
#[test]
fn benchmark_driver_frames() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let config = ServerConfig {
        max_connections: 32,
        ..Default::default()
    };
    let mut driver = ReplicationDriver::new(config, LogicFactory::default(), tx);
    driver.load_level("arena", SANDBOX_LOGIC).unwrap();

    let players: Vec<SocketAddr> = (0..32)
        .map(|port| SocketAddr::from(([127, 0, 0, 1], 5000 + port)))
        .collect();
    for player in &players {
        driver.add_player(*player).unwrap();
        driver.player_ready(*player);
    }

    let moving = PlayerInput {
        up: true,
        ..Default::default()
    };
    let frames = 600;
    let start = Instant::now();

    for frame in 0..frames {
        for player in &players {
            driver
                .handle_input(*player, get_timestamp(), frame as u8, moving.clone())
                .unwrap();
        }
        driver.frame_move(1.0 / 60.0);
        if frame % 3 == 0 {
            driver.send_game_state();
        }
        while rx.try_recv().is_ok() {}
    }

    let duration = start.elapsed();
    println!(
        "Driver: {} frames with {} players in {:?} ({:.2} μs/frame)",
        frames,
        players.len(),
        duration,
        duration.as_micros() as f64 / frames as f64
    );

    // Must stay far below the 16ms physics budget per frame
    assert!(duration.as_millis() < 5000);
}

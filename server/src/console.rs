//! Administrative commands shared by the server's stdin console and rcon.
//!
//! Every command returns a human readable result string; failures are
//! reported in that string rather than as errors so the caller can relay
//! them to a remote administrator unchanged.

use crate::driver::ReplicationDriver;
use crate::logic::SANDBOX_LOGIC;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

const HELP: &str = "\
loadLevel [name] [logic-type]  load a level, defaults to the current one
kick <ip> <port>               disconnect a player
say <message...>               broadcast a chat line
listConnections                show connected players
netSummary                     show and reset traffic per packet type
help                           show this text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    LoadLevel {
        level_name: Option<String>,
        logic_type: Option<String>,
    },
    Kick(SocketAddr),
    Say(String),
    ListConnections,
    NetSummary,
    Help,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();

        match name {
            "loadLevel" => Ok(ConsoleCommand::LoadLevel {
                level_name: args.next().map(str::to_string),
                logic_type: args.next().map(str::to_string),
            }),
            "kick" => parse_peer(rest).map(ConsoleCommand::Kick),
            "say" if !rest.is_empty() => Ok(ConsoleCommand::Say(rest.to_string())),
            "say" => Err("usage: say <message...>".to_string()),
            "listConnections" => Ok(ConsoleCommand::ListConnections),
            "netSummary" => Ok(ConsoleCommand::NetSummary),
            "help" | "?" => Ok(ConsoleCommand::Help),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command '{}', try help", other)),
        }
    }
}

// Accepts "ip port" as well as "ip:port".
fn parse_peer(args: &str) -> Result<SocketAddr, String> {
    const USAGE: &str = "usage: kick <ip> <port>";
    let mut parts = args.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(ip), Some(port), None) => {
            let ip: IpAddr = ip.parse().map_err(|_| format!("invalid address '{}'", ip))?;
            let port: u16 = port.parse().map_err(|_| format!("invalid port '{}'", port))?;
            Ok(SocketAddr::new(ip, port))
        }
        (Some(peer), None, None) => peer
            .parse()
            .map_err(|_| format!("invalid address '{}'\n{}", peer, USAGE)),
        _ => Err(USAGE.to_string()),
    }
}

/// Parses and runs one console line against `driver`.
pub fn execute(driver: &mut ReplicationDriver, line: &str) -> String {
    let command = match line.parse::<ConsoleCommand>() {
        Ok(command) => command,
        Err(message) => return message,
    };

    match command {
        ConsoleCommand::LoadLevel {
            level_name,
            logic_type,
        } => {
            let level_name = level_name.unwrap_or_else(|| driver.level_name().to_string());
            let logic_type = logic_type.unwrap_or_else(|| match driver.logic_type() {
                "" => SANDBOX_LOGIC.to_string(),
                current => current.to_string(),
            });
            if level_name.is_empty() {
                return "no level loaded, usage: loadLevel <name> [logic-type]".to_string();
            }

            match driver.load_level(&level_name, &logic_type) {
                Ok(()) => format!("loaded level {} ({})", level_name, logic_type),
                Err(e) => {
                    let message = format!("failed to load level {}: {}", level_name, e);
                    driver.record_exception(e);
                    message
                }
            }
        }
        ConsoleCommand::Kick(peer) => {
            if driver.kick(peer) {
                format!("kicked {}", peer)
            } else {
                format!("{} is not connected", peer)
            }
        }
        ConsoleCommand::Say(message) => {
            driver.say(&message);
            format!("server: {}", message)
        }
        ConsoleCommand::ListConnections => driver.list_connections(),
        ConsoleCommand::NetSummary => driver.net_summary(),
        ConsoleCommand::Help => HELP.to_string(),
    }
}

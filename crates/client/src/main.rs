mod config;
mod console;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{Receiver, TryRecvError};

use config::ClientConfig;
use console::{Command, ConsoleFrontend};
use kru::Session;

#[derive(Parser)]
#[command(name = "kru-client")]
#[command(about = "Headless kru game client")]
struct Args {
    #[arg(short, long, help = "TOML file with client and connection settings")]
    config: Option<PathBuf>,

    #[arg(long, help = "Game server host name or address")]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long)]
    username: Option<String>,

    #[arg(short, long, help = "Application ticks per second")]
    tick_rate: Option<u32>,

    #[arg(long, help = "Connect immediately instead of waiting for 'connect'")]
    auto_connect: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(host) = args.host {
        config.connection.host = host;
    }
    if let Some(port) = args.port {
        config.connection.port = port;
    }
    if let Some(username) = args.username {
        config.username = username;
    }
    if let Some(tick_rate) = args.tick_rate {
        config.tick_rate = tick_rate;
    }

    let input = console::spawn_input()?;
    let mut session = Session::new(config.connection.clone());
    let mut frontend = ConsoleFrontend::new();

    session.start();
    log::info!(
        "Client {} ready, type 'help' for commands",
        kru::CLIENT_VERSION
    );

    if args.auto_connect {
        connect(&mut session, &mut frontend, &config.username);
    }

    run(&mut session, &mut frontend, &input, &config)?;

    session.shutdown();
    log::info!("Client shutting down");
    Ok(())
}

fn run(
    session: &mut Session,
    frontend: &mut ConsoleFrontend,
    input: &Receiver<String>,
    config: &ClientConfig,
) -> Result<()> {
    let tick = Duration::from_secs_f64(1.0 / f64::from(config.tick_rate.max(1)));
    let mut next_tick = Instant::now();

    loop {
        loop {
            let line = match input.try_recv() {
                Ok(line) => line,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            };
            if line.trim().is_empty() {
                continue;
            }

            match Command::parse(&line) {
                Ok(Command::Quit) => return Ok(()),
                Ok(command) => handle_command(session, frontend, command, &config.username),
                Err(e) => log::warn!("{}", e),
            }
        }

        session.tick(frontend);
        if !session.state().is_active() {
            frontend.connect_enabled = true;
        }

        next_tick += tick;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
    }
}

fn handle_command(
    session: &mut Session,
    frontend: &mut ConsoleFrontend,
    command: Command,
    username: &str,
) {
    match command {
        Command::Connect => connect(session, frontend, username),
        Command::Disconnect => session.disconnect(),
        Command::Buy(item_id) => {
            if session.is_connected() {
                session.purchase_item(item_id);
            } else {
                log::warn!("Not connected");
            }
        }
        Command::Status => {
            let player = session.player();
            log::info!(
                "State: {:?} Gold: {} Huts: {} In game: {}",
                session.state(),
                player.gold,
                player.huts(),
                player.in_game
            );
            log::info!("Screen: {}", frontend.screen());
        }
        Command::Help => {
            log::info!("Commands: connect, disconnect, buy [hut|farm|<id>], status, quit");
        }
        Command::Quit => {}
    }
}

fn connect(session: &mut Session, frontend: &mut ConsoleFrontend, username: &str) {
    if session.connect(username) {
        frontend.connect_enabled = false;
    } else {
        log::warn!("A connection is already active");
    }
}

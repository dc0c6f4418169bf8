use std::io::{self, BufRead};
use std::thread;

use crossbeam_channel::{Receiver, unbounded};
use kru::{Frontend, ItemType, PlayerState};

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    Disconnect,
    Buy(u16),
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err("empty command".to_string());
        };

        match verb.to_ascii_lowercase().as_str() {
            "connect" | "login" => Ok(Command::Connect),
            "disconnect" | "cancel" => Ok(Command::Disconnect),
            "buy" => {
                let item = words.next().unwrap_or("hut");
                parse_item(item).map(Command::Buy)
            }
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

fn parse_item(word: &str) -> Result<u16, String> {
    match word.to_ascii_lowercase().as_str() {
        "hut" => Ok(ItemType::Hut.id()),
        "farm" => Ok(ItemType::Farm.id()),
        other => other
            .parse()
            .map_err(|_| format!("unknown item '{}'", word)),
    }
}

/// Reads stdin on its own thread so the tick loop never blocks on input.
pub fn spawn_input() -> io::Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("kru-input".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Prints what the session asks the UI to show.
#[derive(Debug, Default)]
pub struct ConsoleFrontend {
    pub connect_enabled: bool,
    pub in_main_scene: bool,
    pub game_loop_running: bool,
    pub last_response: Option<String>,
}

impl ConsoleFrontend {
    pub fn new() -> Self {
        Self {
            connect_enabled: true,
            ..Self::default()
        }
    }

    /// One-line summary of the screen the player would be looking at.
    pub fn screen(&self) -> String {
        let scene = if self.in_main_scene { "main" } else { "login" };
        match &self.last_response {
            Some(text) => format!("{} scene, last message: {}", scene, text),
            None => format!("{} scene", scene),
        }
    }
}

impl Frontend for ConsoleFrontend {
    fn notify_timeout(&mut self) {
        self.connect_enabled = true;
        self.last_response = Some("Client connection timeout to game server".to_string());
        log::warn!("Client connection timeout to game server");
    }

    fn show_server_response(&mut self, text: &str) {
        self.connect_enabled = true;
        self.last_response = Some(text.to_string());
        log::info!("Server: {}", text);
    }

    fn log_message(&mut self, text: &str) {
        log::info!("{}", text);
    }

    fn load_timeout_scene(&mut self) {
        self.in_main_scene = false;
        self.game_loop_running = false;
        log::info!("Returned to the login screen");
    }

    fn load_main_scene(&mut self) {
        self.in_main_scene = true;
        self.last_response = None;
        log::info!("Entered the main scene");
    }

    fn start_game_loop(&mut self) {
        self.game_loop_running = true;
    }

    fn player_updated(&mut self, player: &PlayerState) {
        log::info!("Gold: {} Huts: {}", player.gold, player.huts());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("connect"), Ok(Command::Connect));
        assert_eq!(Command::parse("buy"), Ok(Command::Buy(0)));
        assert_eq!(Command::parse("buy farm"), Ok(Command::Buy(1)));
        assert_eq!(Command::parse("BUY 12"), Ok(Command::Buy(12)));
        assert_eq!(Command::parse("  quit  "), Ok(Command::Quit));
        assert!(Command::parse("buy castle").is_err());
        assert!(Command::parse("dance").is_err());
        assert!(Command::parse("").is_err());
    }

    #[test]
    fn test_frontend_reenables_connect_on_timeout() {
        let mut frontend = ConsoleFrontend::new();
        frontend.connect_enabled = false;
        frontend.load_main_scene();
        frontend.start_game_loop();

        frontend.notify_timeout();
        frontend.load_timeout_scene();

        assert!(frontend.connect_enabled);
        assert!(!frontend.in_main_scene);
        assert!(!frontend.game_loop_running);
        assert_eq!(
            frontend.screen(),
            "login scene, last message: Client connection timeout to game server"
        );
    }

    #[test]
    fn test_main_scene_clears_login_feedback() {
        let mut frontend = ConsoleFrontend::new();
        frontend.show_server_response("Version mismatch");
        frontend.load_main_scene();
        assert_eq!(frontend.screen(), "main scene");
    }
}

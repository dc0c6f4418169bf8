use super::instruction::Instruction;
use super::player::PlayerState;
use super::queue::WorkQueue;

/// The UI and scene side of the client, as seen by the session.
pub trait Frontend {
    /// Re-enable the connect button and tell the user the server is unreachable.
    fn notify_timeout(&mut self);

    fn show_server_response(&mut self, text: &str);

    fn log_message(&mut self, text: &str);

    fn load_timeout_scene(&mut self);

    /// Leave the connecting screen for the main scene and clear login feedback.
    fn load_main_scene(&mut self);

    fn start_game_loop(&mut self);

    fn player_updated(&mut self, _player: &PlayerState) {}
}

/// Applies every instruction queued at the time of the call, oldest first.
///
/// The batch is taken before any handler runs, so anything queued while it
/// is being applied waits for the next tick.
pub fn apply_instructions<F: Frontend + ?Sized>(
    queue: &WorkQueue<Instruction>,
    player: &mut PlayerState,
    frontend: &mut F,
) -> usize {
    let batch = queue.drain();
    let applied = batch.len();

    for instruction in batch {
        log::trace!("Applying {}", instruction.name());
        match instruction {
            Instruction::NotifyUserOfTimeout => frontend.notify_timeout(),
            Instruction::ServerResponseMessage(text) => frontend.show_server_response(&text),
            Instruction::LogMessage(text) => frontend.log_message(&text),
            Instruction::LoadSceneForDisconnectTimeout => {
                frontend.load_timeout_scene();
                player.in_game = false;
            }
            Instruction::LoadMainScene => {
                frontend.load_main_scene();
                player.in_game = true;
            }
            Instruction::LoginSuccess => frontend.start_game_loop(),
            Instruction::UpdatePlayer(update) => {
                player.apply(&update);
                frontend.player_updated(player);
            }
        }
    }

    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PlayerUpdate;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Frontend for Recorder {
        fn notify_timeout(&mut self) {
            self.calls.push("timeout".into());
        }

        fn show_server_response(&mut self, text: &str) {
            self.calls.push(format!("response:{}", text));
        }

        fn log_message(&mut self, text: &str) {
            self.calls.push(format!("log:{}", text));
        }

        fn load_timeout_scene(&mut self) {
            self.calls.push("timeout-scene".into());
        }

        fn load_main_scene(&mut self) {
            self.calls.push("main-scene".into());
        }

        fn start_game_loop(&mut self) {
            self.calls.push("game-loop".into());
        }

        fn player_updated(&mut self, player: &PlayerState) {
            self.calls.push(format!("gold:{}", player.gold));
        }
    }

    #[test]
    fn test_drains_everything_in_order() {
        let queue = WorkQueue::new();
        queue.push(Instruction::LoadMainScene);
        queue.push(Instruction::UpdatePlayer(PlayerUpdate::gold(30)));
        queue.push(Instruction::LoginSuccess);
        queue.push(Instruction::LogMessage("hi".into()));

        let mut player = PlayerState::new();
        let mut frontend = Recorder::default();

        assert_eq!(apply_instructions(&queue, &mut player, &mut frontend), 4);
        assert!(queue.is_empty());
        assert_eq!(
            frontend.calls,
            vec!["main-scene", "gold:30", "game-loop", "log:hi"]
        );
        assert!(player.in_game);
        assert_eq!(player.gold, 30);
    }

    #[test]
    fn test_timeout_leaves_game() {
        let queue = WorkQueue::new();
        queue.push(Instruction::NotifyUserOfTimeout);
        queue.push(Instruction::LoadSceneForDisconnectTimeout);

        let mut player = PlayerState::new();
        player.in_game = true;
        let mut frontend = Recorder::default();

        apply_instructions(&queue, &mut player, &mut frontend);

        assert_eq!(frontend.calls, vec!["timeout", "timeout-scene"]);
        assert!(!player.in_game);
        assert_eq!(apply_instructions(&queue, &mut player, &mut frontend), 0);
    }
}

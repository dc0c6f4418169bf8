use super::instruction::{Instruction, PlayerUpdate, StructureChange};
use crate::net::{
    ItemType, LoginResponse, PurchaseItemResponseCode, PurchasedItem, ServerMessage, Version,
    item_name,
};

/// Maps one decoded server message to the instructions the application
/// thread should apply, in the order they must be applied.
pub fn dispatch(message: ServerMessage, client_version: Version) -> Vec<Instruction> {
    match message {
        ServerMessage::LoginResponse(response) => login_response(response, client_version),
        ServerMessage::PurchasedItem(purchase) => purchased_item(purchase),
        ServerMessage::ClientDisconnected { reason } => {
            log::info!("Server closed the session: {:?}", reason);
            vec![Instruction::ServerResponseMessage(reason.as_str().to_string())]
        }
        ServerMessage::CreatedAccount => {
            log::debug!("Ignoring CreatedAccount response");
            Vec::new()
        }
    }
}

fn login_response(response: LoginResponse, client_version: Version) -> Vec<Instruction> {
    match response {
        LoginResponse::VersionMismatch { server_version } => {
            log::warn!(
                "Version mismatch: server {} client {}",
                server_version,
                client_version
            );
            vec![Instruction::ServerResponseMessage(format!(
                "Version mismatch. Server ver. {} Client ver. {}",
                server_version, client_version
            ))]
        }
        LoginResponse::LoginSuccess { gold, structures } => {
            let mut update = PlayerUpdate::gold(gold);
            for (item_id, count) in structures {
                match ItemType::from_id(item_id) {
                    Some(item) => {
                        update = update.with_structure(item, StructureChange::Set(count))
                    }
                    None => log::debug!("Skipping count for unknown item {}", item_id),
                }
            }

            vec![
                Instruction::LoadMainScene,
                Instruction::UpdatePlayer(update),
                Instruction::LoginSuccess,
            ]
        }
    }
}

fn purchased_item(purchase: PurchasedItem) -> Vec<Instruction> {
    let name = item_name(purchase.item_id);
    let item = ItemType::from_id(purchase.item_id);

    match purchase.code {
        PurchaseItemResponseCode::NotEnoughGold => vec![
            Instruction::LogMessage(format!("You do not have enough gold for {}.", name)),
            Instruction::UpdatePlayer(PlayerUpdate::gold(purchase.gold)),
        ],
        PurchaseItemResponseCode::Purchased => {
            let cost = item.map_or(crate::net::ITEM_COST, |item| item.cost());
            let mut update = PlayerUpdate::gold(purchase.gold);
            if let Some(item) = item.filter(ItemType::counts_structures) {
                update = update.with_structure(item, StructureChange::Increment);
            }

            vec![
                Instruction::LogMessage(format!("Bought {} for {} gold.", name, cost)),
                Instruction::UpdatePlayer(update),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{CLIENT_VERSION, DisconnectReason};
    use crate::session::PlayerState;

    fn apply_all(player: &mut PlayerState, instructions: &[Instruction]) {
        for instruction in instructions {
            if let Instruction::UpdatePlayer(update) = instruction {
                player.apply(update);
            }
        }
    }

    #[test]
    fn test_version_mismatch_message() {
        let instructions = dispatch(
            ServerMessage::LoginResponse(LoginResponse::VersionMismatch {
                server_version: Version::new(1, 2, 3),
            }),
            Version::new(0, 1, 0),
        );

        assert_eq!(instructions.len(), 1);
        let Instruction::ServerResponseMessage(text) = &instructions[0] else {
            panic!("expected ServerResponseMessage, got {:?}", instructions[0]);
        };
        assert!(text.contains("1.2.3"));
        assert!(text.contains("0.1.0"));
    }

    #[test]
    fn test_login_success_sequence() {
        let instructions = dispatch(
            ServerMessage::LoginResponse(LoginResponse::LoginSuccess {
                gold: 500,
                structures: vec![(ItemType::Hut.id(), 4), (999, 1)],
            }),
            CLIENT_VERSION,
        );

        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[0], Instruction::LoadMainScene);
        assert_eq!(instructions[2], Instruction::LoginSuccess);

        let mut player = PlayerState::new();
        apply_all(&mut player, &instructions);
        assert_eq!(player.gold, 500);
        assert_eq!(player.huts(), 4);
    }

    #[test]
    fn test_purchase_uses_authoritative_gold() {
        let mut player = PlayerState::new();
        player.gold = 100;
        player.apply(&PlayerUpdate::default().with_structure(ItemType::Hut, StructureChange::Set(1)));

        let instructions = dispatch(
            ServerMessage::PurchasedItem(PurchasedItem {
                code: PurchaseItemResponseCode::Purchased,
                item_id: ItemType::Hut.id(),
                gold: 42,
            }),
            CLIENT_VERSION,
        );

        assert_eq!(
            instructions[0],
            Instruction::LogMessage("Bought Hut for 25 gold.".to_string())
        );
        apply_all(&mut player, &instructions);
        assert_eq!(player.gold, 42);
        assert_eq!(player.huts(), 2);
    }

    #[test]
    fn test_purchase_of_decorative_item() {
        let mut player = PlayerState::new();
        let instructions = dispatch(
            ServerMessage::PurchasedItem(PurchasedItem {
                code: PurchaseItemResponseCode::Purchased,
                item_id: ItemType::Farm.id(),
                gold: 75,
            }),
            CLIENT_VERSION,
        );

        apply_all(&mut player, &instructions);
        assert_eq!(player.gold, 75);
        assert_eq!(player.huts(), 0);
        assert_eq!(player.structure_count(ItemType::Farm), 0);
    }

    #[test]
    fn test_not_enough_gold() {
        let instructions = dispatch(
            ServerMessage::PurchasedItem(PurchasedItem {
                code: PurchaseItemResponseCode::NotEnoughGold,
                item_id: ItemType::Hut.id(),
                gold: 10,
            }),
            CLIENT_VERSION,
        );

        assert_eq!(
            instructions,
            vec![
                Instruction::LogMessage("You do not have enough gold for Hut.".to_string()),
                Instruction::UpdatePlayer(PlayerUpdate::gold(10)),
            ]
        );
    }

    #[test]
    fn test_server_disconnect_reason() {
        let instructions = dispatch(
            ServerMessage::ClientDisconnected {
                reason: DisconnectReason::Maintenance,
            },
            CLIENT_VERSION,
        );
        assert!(matches!(
            &instructions[..],
            [Instruction::ServerResponseMessage(text)] if text.contains("maintenance")
        ));
        assert!(dispatch(ServerMessage::CreatedAccount, CLIENT_VERSION).is_empty());
    }
}

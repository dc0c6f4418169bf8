//! Property tests for the opcode frame codec.

use kru::net::{
    LoginResponse, MAX_FRAME_SIZE, PurchaseItemResponseCode, PurchasedItem,
    decode_client_message, decode_server_message, encode_client_message, encode_server_message,
};
use kru::{ClientMessage, ServerMessage, Version};
use proptest::prelude::*;

proptest! {
    #[test]
    fn arbitrary_bytes_dont_crash_server_decoder(
        bytes in prop::collection::vec(any::<u8>(), 0..1500),
    ) {
        let result = decode_server_message(&bytes);
        if bytes.is_empty() || bytes.len() > MAX_FRAME_SIZE {
            prop_assert!(result.is_err());
        }
    }

    #[test]
    fn arbitrary_bytes_dont_crash_client_decoder(
        bytes in prop::collection::vec(any::<u8>(), 0..1500),
    ) {
        let _ = decode_client_message(&bytes);
    }

    #[test]
    fn login_roundtrips(
        username in "[a-zA-Z0-9_ ]{0,64}",
        major in any::<u8>(),
        minor in any::<u8>(),
        patch in any::<u8>(),
    ) {
        let message = ClientMessage::Login {
            username,
            version: Version::new(major, minor, patch),
        };
        let frame = encode_client_message(&message).unwrap();
        prop_assert_eq!(decode_client_message(&frame).unwrap(), message);
    }

    #[test]
    fn login_success_roundtrips(
        gold in any::<u32>(),
        structures in prop::collection::vec((any::<u16>(), any::<u32>()), 0..32),
    ) {
        let message = ServerMessage::LoginResponse(LoginResponse::LoginSuccess { gold, structures });
        let frame = encode_server_message(&message).unwrap();
        prop_assert!(frame.len() <= MAX_FRAME_SIZE);
        prop_assert_eq!(decode_server_message(&frame).unwrap(), message);
    }

    #[test]
    fn truncated_purchase_frames_are_rejected(
        item_id in any::<u16>(),
        gold in any::<u32>(),
        cut in 1usize..8,
    ) {
        let message = ServerMessage::PurchasedItem(PurchasedItem {
            code: PurchaseItemResponseCode::Purchased,
            item_id,
            gold,
        });
        let frame = encode_server_message(&message).unwrap();
        let cut = cut.min(frame.len() - 1);
        prop_assert!(decode_server_message(&frame[..frame.len() - cut]).is_err());
    }
}

//! Maps raw webhook payloads to canonical transfer events.
//!
//! Classification is fee-payer centric: the first transfer of the target
//! mint decides the event, and the fee payer's side of it decides the
//! direction. Transfers between two third parties are ignored.

use crate::events::{Direction, TransferEvent, WebhookPayload};
use crate::logger::{self, LogTag};

/// Extract zero or one canonical event from a payload.
///
/// The wallet on the event is always the fee payer's account as seen in
/// the matching transfer. Tracked-wallet membership is not checked here;
/// alerts key off the token mint and the wallet is carried for display.
pub fn parse_payload(payload: &WebhookPayload, target_mint: &str) -> Vec<TransferEvent> {
    let (signature, timestamp) = match (&payload.signature, payload.timestamp) {
        (Some(signature), Some(timestamp)) => (signature.clone(), timestamp),
        _ => return Vec::new(),
    };

    let transfer = match payload.token_transfers.iter().find(|t| t.mint == target_mint) {
        Some(transfer) => transfer,
        None => return Vec::new(),
    };

    let direction = if transfer.to_user_account == payload.fee_payer
        && !payload.fee_payer.is_empty()
    {
        Direction::Buy
    } else if transfer.from_user_account == payload.fee_payer && !payload.fee_payer.is_empty() {
        Direction::Sell
    } else {
        logger::debug(
            LogTag::Parser,
            &format!(
                "Transfer of {} in {} does not involve fee payer, skipping",
                target_mint, signature
            ),
        );
        return Vec::new();
    };

    let wallet = match direction {
        Direction::Buy => transfer.to_user_account.clone(),
        Direction::Sell => transfer.from_user_account.clone(),
    };

    vec![TransferEvent {
        wallet,
        mint: transfer.mint.clone(),
        amount: transfer.token_amount,
        decimals: transfer.decimals.unwrap_or(0),
        signature,
        timestamp,
        direction,
        usd_value: None,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TokenTransfer;

    const MINT: &str = "So11111111111111111111111111111111111111112";

    fn payload(fee_payer: &str, transfers: Vec<TokenTransfer>) -> WebhookPayload {
        WebhookPayload {
            signature: Some("sig1".to_string()),
            timestamp: Some(1_700_000_000),
            fee_payer: fee_payer.to_string(),
            token_transfers: transfers,
        }
    }

    fn transfer(from: &str, to: &str, mint: &str, amount: u64) -> TokenTransfer {
        TokenTransfer {
            from_user_account: from.to_string(),
            to_user_account: to.to_string(),
            mint: mint.to_string(),
            token_amount: amount,
            decimals: Some(9),
        }
    }

    #[test]
    fn detects_buy_when_fee_payer_receives() {
        let p = payload("W1", vec![transfer("X", "W1", MINT, 1000)]);
        let events = parse_payload(&p, MINT);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::Buy);
        assert_eq!(events[0].wallet, "W1");
        assert_eq!(events[0].amount, 1000);
        assert_eq!(events[0].timestamp, 1_700_000_000);
        assert_eq!(events[0].decimals, 9);
    }

    #[test]
    fn detects_sell_when_fee_payer_sends() {
        let p = payload("W1", vec![transfer("W1", "X", MINT, 500)]);
        let events = parse_payload(&p, MINT);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::Sell);
        assert_eq!(events[0].wallet, "W1");
    }

    #[test]
    fn ignores_transfers_of_other_mints() {
        let p = payload("W1", vec![transfer("X", "W1", "OtherMint", 1000)]);
        assert!(parse_payload(&p, MINT).is_empty());
    }

    #[test]
    fn ignores_third_party_transfers() {
        let p = payload("W1", vec![transfer("X", "Y", MINT, 1000)]);
        assert!(parse_payload(&p, MINT).is_empty());
    }

    #[test]
    fn first_target_mint_transfer_wins() {
        let p = payload(
            "W1",
            vec![
                transfer("X", "Y", MINT, 111),
                transfer("X", "W1", MINT, 222),
            ],
        );
        // The first matching transfer does not involve the fee payer, so
        // nothing is emitted even though a later one would qualify.
        assert!(parse_payload(&p, MINT).is_empty());
    }

    #[test]
    fn emits_at_most_one_event() {
        let p = payload(
            "W1",
            vec![
                transfer("X", "W1", MINT, 111),
                transfer("W1", "X", MINT, 222),
            ],
        );
        let events = parse_payload(&p, MINT);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].amount, 111);
    }

    #[test]
    fn missing_decimals_defaults_to_zero() {
        let mut t = transfer("X", "W1", MINT, 1000);
        t.decimals = None;
        let p = payload("W1", vec![t]);
        let events = parse_payload(&p, MINT);
        assert_eq!(events[0].decimals, 0);
    }

    #[test]
    fn rejects_payload_without_signature() {
        let mut p = payload("W1", vec![transfer("X", "W1", MINT, 1000)]);
        p.signature = None;
        assert!(!p.is_well_formed());
        assert!(parse_payload(&p, MINT).is_empty());
    }

    #[test]
    fn well_formed_requires_timestamp() {
        let mut p = payload("W1", vec![]);
        p.timestamp = None;
        assert!(!p.is_well_formed());
    }

    #[test]
    fn deserializes_helius_camel_case() {
        let raw = r#"{
            "signature": "abc",
            "timestamp": 1700000123,
            "feePayer": "W9",
            "tokenTransfers": [
                {"fromUserAccount": "A", "toUserAccount": "W9", "mint": "M", "tokenAmount": 42, "decimals": 6}
            ],
            "type": "TRANSFER",
            "slot": 12345
        }"#;
        let p: WebhookPayload = serde_json::from_str(raw).unwrap();
        assert!(p.is_well_formed());
        assert_eq!(p.fee_payer, "W9");
        assert_eq!(p.token_transfers.len(), 1);
        let events = parse_payload(&p, "M");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, Direction::Buy);
        assert_eq!(events[0].decimals, 6);
    }
}

use chrono::{DateTime, Utc};
use rand::Rng;

use shared_models::payment::{Payment, PaymentStatus, PaymentUpdate};

use crate::services::gateway::TransactionStatus;

const ORDER_SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ORDER_SUFFIX_LEN: usize = 9;

/// `ORDER-{unixMillis}-{9 uppercase alphanumerics}`.
pub fn generate_order_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_SUFFIX_LEN)
        .map(|_| ORDER_SUFFIX_CHARSET[rng.gen_range(0..ORDER_SUFFIX_CHARSET.len())] as char)
        .collect();
    format!("ORDER-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Maps a gateway transaction status onto the local vocabulary. Anything not
/// recognised, including a capture that fraud screening did not accept,
/// reads as `Pending`.
pub fn map_gateway_status(transaction_status: &str, fraud_status: Option<&str>) -> PaymentStatus {
    match transaction_status {
        "capture" if fraud_status == Some("accept") => PaymentStatus::Paid,
        "settlement" => PaymentStatus::Paid,
        "cancel" | "deny" | "expire" => PaymentStatus::Failed,
        "refund" => PaymentStatus::Refunded,
        _ => PaymentStatus::Pending,
    }
}

/// The status a payment moves to, or `None` when `reported` is not a forward
/// move from `current`. PAID never regresses and REFUNDED is terminal.
pub fn next_status(current: PaymentStatus, reported: PaymentStatus) -> Option<PaymentStatus> {
    use PaymentStatus::*;

    match (current, reported) {
        (Pending, Paid | Failed | Refunded) => Some(reported),
        (Failed, Paid | Refunded) => Some(reported),
        (Paid, Refunded) => Some(reported),
        _ => None,
    }
}

/// The snapshot written for one reconciliation pass. Transaction id, method
/// and raw payload are refreshed even when the status stays put.
pub fn plan_update(current: &Payment, reported: &TransactionStatus, now: DateTime<Utc>) -> PaymentUpdate {
    let mapped = map_gateway_status(&reported.transaction_status, reported.fraud_status.as_deref());
    let status = next_status(current.status, mapped);
    let paid_at = (status == Some(PaymentStatus::Paid) && current.paid_at.is_none()).then_some(now);

    PaymentUpdate {
        status,
        paid_at,
        gateway_transaction_id: reported.transaction_id.clone(),
        payment_method: reported.payment_type.clone(),
        raw_gateway_payload: reported.raw.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use PaymentStatus::*;

    fn payment(status: PaymentStatus) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            consultation_id: Uuid::new_v4(),
            payer_id: Uuid::new_v4(),
            amount: 75_000,
            status,
            gateway_order_id: "ORDER-1-ABCDEFGHI".to_string(),
            gateway_transaction_id: None,
            payment_method: None,
            paid_at: None,
            raw_gateway_payload: json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    fn reported(transaction_status: &str, fraud: Option<&str>) -> TransactionStatus {
        TransactionStatus {
            order_id: "ORDER-1-ABCDEFGHI".to_string(),
            transaction_status: transaction_status.to_string(),
            fraud_status: fraud.map(str::to_string),
            transaction_id: Some("txn-1".to_string()),
            payment_type: Some("bank_transfer".to_string()),
            raw: json!({"transaction_status": transaction_status}),
        }
    }

    #[test]
    fn gateway_statuses_map_onto_local_ones() {
        assert_eq!(map_gateway_status("capture", Some("accept")), Paid);
        assert_eq!(map_gateway_status("capture", Some("challenge")), Pending);
        assert_eq!(map_gateway_status("settlement", None), Paid);
        assert_eq!(map_gateway_status("expire", None), Failed);
        assert_eq!(map_gateway_status("deny", None), Failed);
        assert_eq!(map_gateway_status("refund", None), Refunded);
        assert_eq!(map_gateway_status("authorize", None), Pending);
    }

    #[test]
    fn paid_and_refunded_never_regress() {
        assert_eq!(next_status(Paid, Pending), None);
        assert_eq!(next_status(Paid, Failed), None);
        assert_eq!(next_status(Paid, Paid), None);
        assert_eq!(next_status(Refunded, Paid), None);
        assert_eq!(next_status(Paid, Refunded), Some(Refunded));
        assert_eq!(next_status(Failed, Paid), Some(Paid));
        assert_eq!(next_status(Pending, Pending), None);
    }

    #[test]
    fn settlement_stamps_paid_at_once() {
        let now = Utc::now();
        let update = plan_update(&payment(Pending), &reported("settlement", None), now);
        assert_eq!(update.status, Some(Paid));
        assert_eq!(update.paid_at, Some(now));

        let mut paid = payment(Paid);
        paid.paid_at = Some(now);
        let again = plan_update(&paid, &reported("settlement", None), Utc::now());
        assert_eq!(again.status, None);
        assert_eq!(again.paid_at, None);
        assert_eq!(again.gateway_transaction_id.as_deref(), Some("txn-1"));
    }

    #[test]
    fn partial_refund_keeps_a_paid_payment_paid() {
        assert_eq!(map_gateway_status("partial_refund", None), Pending);

        let mut paid = payment(Paid);
        paid.paid_at = Some(Utc::now());
        let update = plan_update(&paid, &reported("partial_refund", None), Utc::now());
        assert_eq!(update.status, None);
        assert_eq!(update.raw_gateway_payload["transaction_status"], "partial_refund");
    }

    #[test]
    fn order_ids_have_expected_shape() {
        let id = generate_order_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORDER");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert_ne!(id, generate_order_id());
    }
}

use crate::sink::notification_line;

use models::{EntityType, RealtimeMessage};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// **VALUE**: Notification lines carry time, status, summary and order id.
#[test]
fn given_shipment_update_when_formatted_then_line_has_all_parts() {
    // GIVEN: A shipment update without a server message
    let message = RealtimeMessage::ShipmentStatusUpdate {
        shipment_order_id: "so-1".to_string(),
        status: "DELIVERED".to_string(),
        message: String::new(),
        timestamp: None,
    };
    let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    // WHEN: Formatting
    let line = notification_line(&message, at);

    // THEN: Fallback summary and order tag
    assert!(line.starts_with("[2023-11-14T22:13:20Z]"), "Got: {line}");
    assert!(line.contains("DELIVERED"));
    assert!(line.contains("Shipment so-1 - Status: DELIVERED"));
    assert!(line.ends_with("(order so-1)"));
}

#[test]
fn given_generic_status_update_when_formatted_then_no_order_tag() {
    let message = RealtimeMessage::StatusUpdate {
        entity_id: "o-9".to_string(),
        entity_type: EntityType::Order,
        status: "CANCELLED".to_string(),
        message: "Order cancelled by customer".to_string(),
        timestamp: None,
    };

    let line = notification_line(&message, SystemTime::now());

    assert!(line.contains("Order cancelled by customer"));
    assert!(!line.contains("(order"));
}

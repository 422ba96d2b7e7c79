use crate::{EntityType, RealtimeMessage};

/// **VALUE**: Verifies that a sub-shipment update from the backend decodes with camelCase fields.
///
/// **WHY THIS MATTERS**: The backend sends `{"type":"SUB_STATUS_UPDATE", "subShipmentId": ...}`.
/// If the tag or field casing drifts, every message is dropped as undecodable.
#[test]
fn given_sub_status_json_when_deserialized_then_fields_populated() {
    // GIVEN: A backend payload
    let json = r#"{
        "type": "SUB_STATUS_UPDATE",
        "subShipmentId": "sub-7",
        "shipmentOrderId": "so-1",
        "shipperId": "shipper-3",
        "status": "IN_TRANSIT",
        "message": "Package picked up",
        "timestamp": "2025-01-02T10:00:00"
    }"#;

    // WHEN: Deserializing
    let message: RealtimeMessage = serde_json::from_str(json).unwrap();

    // THEN: The right variant with all fields
    match message {
        RealtimeMessage::SubStatusUpdate {
            sub_shipment_id,
            shipment_order_id,
            shipper_id,
            status,
            ..
        } => {
            assert_eq!(sub_shipment_id, "sub-7");
            assert_eq!(shipment_order_id, "so-1");
            assert_eq!(shipper_id.as_deref(), Some("shipper-3"));
            assert_eq!(status, "IN_TRANSIT");
        }
        other => panic!("Expected SubStatusUpdate, got {other:?}"),
    }
}

/// **VALUE**: Verifies that the server's message text wins over the generated summary.
#[test]
fn given_message_text_when_summarised_then_uses_text() {
    // GIVEN: A shipment update with text
    let message = RealtimeMessage::ShipmentStatusUpdate {
        shipment_order_id: "so-1".to_string(),
        status: "DELIVERED".to_string(),
        message: "Order delivered".to_string(),
        timestamp: None,
    };

    // WHEN / THEN
    assert_eq!(message.summary(), "Order delivered");
}

/// **VALUE**: Verifies the fallback summary for each variant when the text is empty.
///
/// **BUG THIS CATCHES**: Would catch a blank notification line when the backend omits
/// `message`, which it does for bulk status changes.
#[test]
fn given_empty_message_when_summarised_then_builds_fallback() {
    // GIVEN: Messages without text
    let shipment = RealtimeMessage::ShipmentStatusUpdate {
        shipment_order_id: "so-1".to_string(),
        status: "PENDING".to_string(),
        message: String::new(),
        timestamp: None,
    };
    let generic: RealtimeMessage = serde_json::from_str(
        r#"{"type":"STATUS_UPDATE","entityId":"o-9","entityType":"ORDER","status":"CANCELLED"}"#,
    )
    .unwrap();
    let assigned: RealtimeMessage = serde_json::from_str(
        r#"{"type":"ASSIGNED","subShipmentId":"sub-1","shipmentOrderId":"so-1","shipperId":"s-1","status":"ASSIGNED","message":"  "}"#,
    )
    .unwrap();

    // WHEN / THEN: Fallbacks name the entity and status
    assert_eq!(shipment.summary(), "Shipment so-1 - Status: PENDING");
    assert_eq!(generic.summary(), "ORDER o-9 - Status: CANCELLED");
    assert_eq!(assigned.summary(), "Assigned sub-shipment sub-1 - Status: ASSIGNED");
    assert_eq!(generic.shipment_order_id(), None);
    assert_eq!(assigned.shipment_order_id(), Some("so-1"));
}

/// **VALUE**: Verifies that an unknown `type` tag is rejected instead of being misread.
#[test]
fn given_unknown_type_when_deserialized_then_error() {
    let result = serde_json::from_str::<RealtimeMessage>(r#"{"type":"PING"}"#);
    assert!(result.is_err());
}

/// **VALUE**: Verifies the entity type wire names used in summaries.
#[test]
fn given_entity_types_when_displayed_then_match_wire_names() {
    assert_eq!(EntityType::SubShipment.to_string(), "SUB_SHIPMENT");
    assert_eq!(
        serde_json::to_string(&EntityType::SubShipment).unwrap(),
        "\"SUB_SHIPMENT\""
    );
}

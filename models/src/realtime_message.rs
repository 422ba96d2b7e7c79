//! Status messages pushed by the logistics backend over the realtime channel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of entity a generic [`RealtimeMessage::StatusUpdate`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Shipment,
    SubShipment,
    Order,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Shipment => "SHIPMENT",
            EntityType::SubShipment => "SUB_SHIPMENT",
            EntityType::Order => "ORDER",
        };
        f.write_str(name)
    }
}

/// A message delivered on one of the subscribed topics.
///
/// Wire format is JSON, internally tagged on `type` with camelCase fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RealtimeMessage {
    #[serde(rename_all = "camelCase")]
    ShipmentStatusUpdate {
        shipment_order_id: String,
        status: String,
        #[serde(default)]
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    SubStatusUpdate {
        sub_shipment_id: String,
        shipment_order_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shipper_id: Option<String>,
        status: String,
        #[serde(default)]
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    StatusUpdate {
        entity_id: String,
        entity_type: EntityType,
        status: String,
        #[serde(default)]
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },

    /// A sub-shipment was assigned to a shipper.
    #[serde(rename_all = "camelCase")]
    Assigned {
        sub_shipment_id: String,
        shipment_order_id: String,
        shipper_id: String,
        status: String,
        #[serde(default)]
        message: String,
    },
}

impl RealtimeMessage {
    pub fn status(&self) -> &str {
        match self {
            RealtimeMessage::ShipmentStatusUpdate { status, .. }
            | RealtimeMessage::SubStatusUpdate { status, .. }
            | RealtimeMessage::StatusUpdate { status, .. }
            | RealtimeMessage::Assigned { status, .. } => status,
        }
    }

    /// Shipment order the message belongs to, if it names one.
    pub fn shipment_order_id(&self) -> Option<&str> {
        match self {
            RealtimeMessage::ShipmentStatusUpdate {
                shipment_order_id, ..
            }
            | RealtimeMessage::SubStatusUpdate {
                shipment_order_id, ..
            }
            | RealtimeMessage::Assigned {
                shipment_order_id, ..
            } => Some(shipment_order_id),
            RealtimeMessage::StatusUpdate { .. } => None,
        }
    }

    /// One-line notification text: the server's message when present,
    /// otherwise a description built from ids and status.
    pub fn summary(&self) -> String {
        let (message, fallback) = match self {
            RealtimeMessage::ShipmentStatusUpdate {
                shipment_order_id,
                status,
                message,
                ..
            } => (
                message,
                format!("Shipment {shipment_order_id} - Status: {status}"),
            ),
            RealtimeMessage::SubStatusUpdate {
                sub_shipment_id,
                status,
                message,
                ..
            } => (
                message,
                format!("Sub-Shipment {sub_shipment_id} - Status: {status}"),
            ),
            RealtimeMessage::StatusUpdate {
                entity_id,
                entity_type,
                status,
                message,
                ..
            } => (message, format!("{entity_type} {entity_id} - Status: {status}")),
            RealtimeMessage::Assigned {
                sub_shipment_id,
                status,
                message,
                ..
            } => (
                message,
                format!("Assigned sub-shipment {sub_shipment_id} - Status: {status}"),
            ),
        };

        if message.trim().is_empty() {
            fallback
        } else {
            message.clone()
        }
    }
}

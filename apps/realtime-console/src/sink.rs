use models::RealtimeMessage;
use realtime_core::MessageHandler;

use std::sync::Arc;
use std::time::SystemTime;

use humantime::format_rfc3339_seconds;

/// Handler that prints one line per notification to stdout.
pub fn console_handler() -> MessageHandler {
    Arc::new(|message: &RealtimeMessage| {
        println!("{}", notification_line(message, SystemTime::now()));
    })
}

/// `[<time>] <STATUS> <summary>`, optionally tagged with the shipment order.
pub fn notification_line(message: &RealtimeMessage, at: SystemTime) -> String {
    let order = message
        .shipment_order_id()
        .map(|id| format!(" (order {id})"))
        .unwrap_or_default();

    format!(
        "[{}] {:<12} {}{}",
        format_rfc3339_seconds(at),
        message.status(),
        message.summary(),
        order
    )
}

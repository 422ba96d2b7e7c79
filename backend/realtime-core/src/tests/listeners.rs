use crate::tests::mock_transport::{recording_handler, shipment_update};
use crate::transport::{ListenerRegistry, MessageHandler};

use models::RealtimeMessage;

use std::sync::Arc;

/// **VALUE**: Cancelling one registration leaves the others in place.
///
/// **BUG THIS CATCHES**: Removing by handler identity or clearing the whole set
/// would silently detach other consumers sharing the transport.
#[test]
fn given_two_listeners_when_one_cancelled_then_other_still_notified() {
    // GIVEN: Two registrations
    let registry = ListenerRegistry::new();
    let (first, first_seen) = recording_handler();
    let (second, second_seen) = recording_handler();
    let first_cancel = registry.add(first);
    let _second_cancel = registry.add(second);
    assert_eq!(registry.len(), 2);

    // WHEN: Cancelling the first and notifying
    first_cancel.cancel();
    let delivered = registry.notify(&shipment_update("CREATED"));

    // THEN: Only the second got it
    assert_eq!(delivered, 1);
    assert!(first_seen.lock().unwrap().is_empty());
    assert_eq!(second_seen.lock().unwrap().len(), 1);
}

/// **VALUE**: A panicking listener does not stop delivery to the rest.
#[test]
fn given_panicking_listener_when_notified_then_others_still_receive() {
    // GIVEN: A panicking listener registered before a well-behaved one
    let registry = ListenerRegistry::new();
    let panicking: MessageHandler = Arc::new(|_: &RealtimeMessage| panic!("listener failure"));
    let (healthy, seen) = recording_handler();
    let _a = registry.add(panicking);
    let _b = registry.add(healthy);

    // WHEN: Notifying
    let delivered = registry.notify(&shipment_update("DELIVERED"));

    // THEN: The healthy listener ran
    assert_eq!(delivered, 1);
    assert_eq!(*seen.lock().unwrap(), vec!["DELIVERED".to_string()]);
}

/// **VALUE**: Cancelling after the registry is gone is harmless.
#[test]
fn given_registry_dropped_when_cancel_called_then_no_panic() {
    // GIVEN: A registration whose registry has been dropped
    let registry = ListenerRegistry::new();
    let (handler, _) = recording_handler();
    let cancel = registry.add(handler);
    drop(registry);

    // WHEN/THEN: Cancelling does nothing
    cancel.cancel();
}

/// **VALUE**: Dropping the cancel handle does not remove the listener.
///
/// **WHY THIS MATTERS**: The registrant owns the registration. Removal is
/// explicit, never a side effect of a handle going out of scope.
#[test]
fn given_cancel_handle_dropped_when_notified_then_listener_still_attached() {
    // GIVEN: A registration whose handle is dropped without cancelling
    let registry = ListenerRegistry::new();
    let (handler, seen) = recording_handler();
    drop(registry.add(handler));

    // WHEN: Notifying
    registry.notify(&shipment_update("CREATED"));

    // THEN: Still delivered
    assert_eq!(registry.len(), 1);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

use serialtester_core::{
    EngineError, EngineEvent, EventFilter, EventKind, EventListeners, PayloadGenerator,
    PayloadLine, PortConfig, SessionState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_transition_table() {
    use SessionState::*;

    // lifecycle transitions
    assert!(Closed.can_transition_to(Open));
    assert!(Closed.can_transition_to(Failed));
    assert!(Failed.can_transition_to(Open));
    assert!(Failed.can_transition_to(Failed));
    assert!(Open.can_transition_to(Closed));
    assert!(Open.can_transition_to(Failed));

    // close on a session that is not open changes nothing
    assert!(!Closed.can_transition_to(Closed));
    assert!(!Failed.can_transition_to(Closed));
}

#[test]
fn test_port_config_scenario() {
    let config = PortConfig::new(9600, "COM3").unwrap();
    assert_eq!(config.to_string(), "COM3 @ 9600 baud");

    assert!(matches!(
        PortConfig::new(9600, "   "),
        Err(EngineError::InvalidConfig { .. })
    ));
}

#[test]
fn test_lifecycle_filter_skips_lines() {
    let listeners = EventListeners::new();
    let lifecycle = Arc::new(AtomicUsize::new(0));

    {
        let lifecycle = lifecycle.clone();
        listeners.subscribe(
            EventFilter::Kinds(vec![EventKind::Opened, EventKind::Closed, EventKind::Failed]),
            move |event| {
                assert!(event.is_lifecycle());
                lifecycle.fetch_add(1, Ordering::SeqCst);
            },
        );
    }

    listeners.emit(EngineEvent::Opened);
    for i in 0..5 {
        listeners.emit(EngineEvent::LineReceived(format!("line {}", i)));
    }
    listeners.emit(EngineEvent::Failed);

    assert_eq!(lifecycle.load(Ordering::SeqCst), 2);
}

#[test]
fn test_generated_lines_parse_back() {
    let mut generator = PayloadGenerator::with_seed(2024);

    for _ in 0..50 {
        let [first, second] = generator.next_pair();
        let a: PayloadLine = first.parse().unwrap();
        let b: PayloadLine = second.parse().unwrap();

        assert_eq!(a.effect, 1);
        assert_eq!(b.effect, 2);
        assert_eq!(a.to_string(), first);
        assert_eq!(b.to_string(), second);
    }
}

//! Coordinator lifecycle integration tests.
//!
//! These tests drive the full reservation lifecycle through the coordinator
//! with a mocked booking service and a scripted status channel:
//! idle -> reserving -> awaiting_payment -> ... -> completed/failed/expired

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};

use boxoffice_core::{
    testing::{fixtures, MockReservationClient, ScriptStep, ScriptedStatusTransport},
    Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorHandle, FailureReason,
    PaymentStatus, ReservationPhase, ReservationUpdate, ReserveError,
};

/// Test helper bundling the coordinator's mocked collaborators.
struct TestHarness {
    client: Arc<MockReservationClient>,
    transport: Arc<ScriptedStatusTransport>,
    updates: Arc<Mutex<Vec<ReservationUpdate>>>,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            client: Arc::new(MockReservationClient::new()),
            transport: Arc::new(ScriptedStatusTransport::new()),
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn spawn_coordinator(&self) -> CoordinatorHandle {
        self.spawn_with_window(180)
    }

    fn spawn_with_window(&self, payment_window_secs: u32) -> CoordinatorHandle {
        let config = CoordinatorConfig {
            payment_window_secs,
            ..Default::default()
        };

        let updates = Arc::clone(&self.updates);
        Coordinator::new(
            "session-1",
            config,
            Arc::clone(&self.client) as Arc<dyn boxoffice_core::ReservationClient>,
            Arc::clone(&self.transport) as Arc<dyn boxoffice_core::StatusTransport>,
        )
        .with_update_callback(Arc::new(move |update| {
            updates.lock().unwrap().push(update);
        }))
        .spawn()
    }

    /// Phase names seen so far, in transition order.
    fn phase_changes(&self) -> Vec<String> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter_map(|u| match u {
                ReservationUpdate::PhaseChanged { phase, .. } => {
                    Some(phase.phase_type().to_string())
                }
                ReservationUpdate::Countdown { .. } => None,
            })
            .collect()
    }

    async fn wait_for_phase(
        &self,
        handle: &CoordinatorHandle,
        expected: &str,
        timeout: Duration,
    ) -> bool {
        let start = tokio::time::Instant::now();
        let poll_interval = Duration::from_millis(50);

        while start.elapsed() < timeout {
            if let Ok(snapshot) = handle.snapshot().await {
                let phase_type = snapshot.phase.phase_type();
                if phase_type == expected {
                    return true;
                }
                // Stop early on an unexpected terminal phase.
                if snapshot.phase.is_terminal() && phase_type != expected {
                    return false;
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
        false
    }
}

fn ts(secs: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs as i64)
}

fn happy_path_script(first_delay: Duration) -> Vec<ScriptStep> {
    vec![
        ScriptStep::status(first_delay, PaymentStatus::PaymentReceived, ts(1)),
        ScriptStep::status(Duration::from_secs(1), PaymentStatus::Processing, ts(2)),
        ScriptStep::status(Duration::from_secs(1), PaymentStatus::Completed, ts(3)),
    ]
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_scenario_a_inventory_unavailable_never_opens_window() {
    let harness = TestHarness::new();
    harness
        .client
        .queue_error(ReserveError::InventoryUnavailable("sold out".to_string()))
        .await;
    let handle = harness.spawn_coordinator();

    let snapshot = handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();

    assert!(matches!(
        snapshot.phase,
        ReservationPhase::Failed {
            reason: FailureReason::InventoryUnavailable { .. }
        }
    ));
    assert!(!snapshot.channel_connected);
    assert!(snapshot.remaining_secs.is_none());
    assert!(snapshot.instructions.is_none());

    // No channel was ever connected, and the phase path was exactly
    // reserving -> failed.
    assert_eq!(harness.transport.connect_count().await, 0);
    assert_eq!(harness.phase_changes(), vec!["reserving", "failed"]);

    // No timer was started either: nothing expires later.
    tokio::time::sleep(Duration::from_secs(400)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase.phase_type(), "failed");
}

#[tokio::test(start_paused = true)]
async fn test_scenario_b_payment_completes_within_window() {
    let harness = TestHarness::new();
    harness
        .transport
        .push_script(happy_path_script(Duration::from_secs(5)))
        .await;
    let handle = harness.spawn_coordinator();

    let snapshot = handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();
    assert_eq!(snapshot.phase, ReservationPhase::AwaitingPayment);
    assert!(snapshot.channel_connected);
    assert_eq!(snapshot.remaining_secs, Some(180));
    assert!(snapshot.instructions.is_some());

    assert!(
        harness
            .wait_for_phase(&handle, "completed", Duration::from_secs(60))
            .await
    );

    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.channel_connected);

    // Each phase entered exactly once.
    assert_eq!(
        harness.phase_changes(),
        vec![
            "reserving",
            "awaiting_payment",
            "payment_received",
            "processing",
            "completed",
        ]
    );

    // Timer canceled: the window passing changes nothing (P2).
    tokio::time::sleep(Duration::from_secs(400)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, ReservationPhase::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_c_silent_channel_expires_at_window() {
    let harness = TestHarness::new();
    harness
        .transport
        .push_script(vec![ScriptStep::silence(Duration::from_secs(3600))])
        .await;
    let handle = harness.spawn_coordinator();

    handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();

    assert!(
        harness
            .wait_for_phase(&handle, "expired", Duration::from_secs(200))
            .await
    );

    // The coordinator disconnected the channel; it is not left dangling.
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.channel_connected);
    assert_eq!(harness.phase_changes().last().unwrap(), "expired");
}

#[tokio::test(start_paused = true)]
async fn test_scenario_d_failed_event_ends_early() {
    let harness = TestHarness::new();
    harness
        .transport
        .push_script(vec![ScriptStep::status(
            Duration::from_secs(30),
            PaymentStatus::Failed,
            ts(30),
        )])
        .await;
    let handle = harness.spawn_coordinator();

    let start = tokio::time::Instant::now();
    handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();

    assert!(
        harness
            .wait_for_phase(&handle, "failed", Duration::from_secs(200))
            .await
    );

    // Failure lands at second ~30, not at the 180s deadline.
    assert!(start.elapsed() < Duration::from_secs(100));

    let snapshot = handle.snapshot().await.unwrap();
    assert!(matches!(
        snapshot.phase,
        ReservationPhase::Failed {
            reason: FailureReason::PaymentFailed
        }
    ));
    assert!(!snapshot.channel_connected);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_e_retry_from_expired_gets_fresh_reservation() {
    let harness = TestHarness::new();
    // First attempt: silent channel, expires. Second attempt: completes.
    harness
        .transport
        .push_script(vec![ScriptStep::silence(Duration::from_secs(3600))])
        .await;
    harness
        .transport
        .push_script(happy_path_script(Duration::from_secs(1)))
        .await;
    let handle = harness.spawn_with_window(5);

    handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();
    assert!(
        harness
            .wait_for_phase(&handle, "expired", Duration::from_secs(30))
            .await
    );

    let snapshot = handle.retry().await.unwrap();
    assert_eq!(snapshot.phase, ReservationPhase::AwaitingPayment);
    assert_eq!(snapshot.attempt, 2);
    // Retry resets the window in full (P5).
    assert_eq!(snapshot.remaining_secs, Some(5));
    assert!(snapshot.last_event_key.is_none());

    // A fresh reservation id was obtained and the channel reconnected for it.
    let ids = harness.transport.connected_ids().await;
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(harness.client.call_count().await, 2);

    assert!(
        harness
            .wait_for_phase(&handle, "completed", Duration::from_secs(30))
            .await
    );
}

// =============================================================================
// Property Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_p1_timer_and_channel_torn_down_together() {
    let harness = TestHarness::new();
    harness
        .transport
        .push_script(happy_path_script(Duration::from_secs(1)))
        .await;
    let handle = harness.spawn_coordinator();

    let snapshot = handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();
    // Started together on entering the payment window.
    assert!(snapshot.channel_connected);
    assert!(snapshot.remaining_secs.is_some());

    assert!(
        harness
            .wait_for_phase(&handle, "completed", Duration::from_secs(30))
            .await
    );

    // Torn down together on leaving it.
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.channel_connected);
    assert!(snapshot.remaining_secs.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_p1_channel_failure_leaves_timer_as_backstop() {
    let harness = TestHarness::new();
    harness.transport.fail_next_connect().await;
    let handle = harness.spawn_with_window(10);

    let snapshot = handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();

    // A channel error never flips the phase; the window is open without a
    // connection and the timer remains the backstop.
    assert_eq!(snapshot.phase, ReservationPhase::AwaitingPayment);
    assert!(!snapshot.channel_connected);

    assert!(
        harness
            .wait_for_phase(&handle, "expired", Duration::from_secs(30))
            .await
    );
}

#[tokio::test(start_paused = true)]
async fn test_p2_terminal_phase_absorbs_late_signals() {
    let harness = TestHarness::new();
    // `failed` arrives right behind `completed`; it must change nothing.
    let mut script = happy_path_script(Duration::from_secs(1));
    script.push(ScriptStep::status(Duration::ZERO, PaymentStatus::Failed, ts(10)));
    harness.transport.push_script(script).await;
    let handle = harness.spawn_coordinator();

    handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();
    assert!(
        harness
            .wait_for_phase(&handle, "completed", Duration::from_secs(30))
            .await
    );

    tokio::time::sleep(Duration::from_secs(400)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, ReservationPhase::Completed);

    // And explicit commands are rejected, not absorbed silently.
    let err = handle.retry().await.unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidTransition { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_p3_duplicate_event_applies_once() {
    let harness = TestHarness::new();
    // The same payment_received event (identical dedup key) twice.
    harness
        .transport
        .push_script(vec![
            ScriptStep::status(Duration::from_secs(1), PaymentStatus::PaymentReceived, ts(1)),
            ScriptStep::status(Duration::from_secs(1), PaymentStatus::PaymentReceived, ts(1)),
            ScriptStep::silence(Duration::from_secs(3600)),
        ])
        .await;
    let handle = harness.spawn_coordinator();

    handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();
    assert!(
        harness
            .wait_for_phase(&handle, "payment_received", Duration::from_secs(30))
            .await
    );
    tokio::time::sleep(Duration::from_secs(5)).await;

    let transitions = harness.phase_changes();
    let received_count = transitions
        .iter()
        .filter(|p| p.as_str() == "payment_received")
        .count();
    assert_eq!(received_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_p4_completed_before_deadline_wins_every_run() {
    for _ in 0..5 {
        let harness = TestHarness::new();
        // Full progression finishing one second before the deadline.
        harness
            .transport
            .push_script(vec![
                ScriptStep::status(Duration::from_secs(60), PaymentStatus::PaymentReceived, ts(60)),
                ScriptStep::status(Duration::from_secs(60), PaymentStatus::Processing, ts(120)),
                ScriptStep::status(Duration::from_secs(59), PaymentStatus::Completed, ts(179)),
            ])
            .await;
        let handle = harness.spawn_coordinator();

        handle
            .reserve(fixtures::reservation_request("show-1"))
            .await
            .unwrap();
        assert!(
            harness
                .wait_for_phase(&handle, "completed", Duration::from_secs(300))
                .await
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_p4_completed_after_deadline_loses_every_run() {
    for _ in 0..5 {
        let harness = TestHarness::new();
        // Progression that would complete one second after the deadline.
        harness
            .transport
            .push_script(vec![
                ScriptStep::status(Duration::from_secs(60), PaymentStatus::PaymentReceived, ts(60)),
                ScriptStep::status(Duration::from_secs(60), PaymentStatus::Processing, ts(120)),
                ScriptStep::status(Duration::from_secs(61), PaymentStatus::Completed, ts(181)),
            ])
            .await;
        let handle = harness.spawn_coordinator();

        handle
            .reserve(fixtures::reservation_request("show-1"))
            .await
            .unwrap();
        assert!(
            harness
                .wait_for_phase(&handle, "expired", Duration::from_secs(300))
                .await
        );

        // The late completed event must not resurrect the reservation.
        tokio::time::sleep(Duration::from_secs(10)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, ReservationPhase::Expired);
    }
}

#[tokio::test(start_paused = true)]
async fn test_p5_retry_resets_window_and_dedup() {
    let harness = TestHarness::new();
    // First attempt fails via payment_received + failed; the retry re-sends
    // the exact same payment_received event key, which must apply again
    // because the dedup set starts clean.
    harness
        .transport
        .push_script(vec![
            ScriptStep::status(Duration::from_secs(1), PaymentStatus::PaymentReceived, ts(1)),
            ScriptStep::status(Duration::from_secs(1), PaymentStatus::Failed, ts(2)),
        ])
        .await;
    harness
        .transport
        .push_script(vec![
            ScriptStep::status(Duration::from_secs(1), PaymentStatus::PaymentReceived, ts(1)),
            ScriptStep::silence(Duration::from_secs(3600)),
        ])
        .await;
    let handle = harness.spawn_coordinator();

    handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();
    assert!(
        harness
            .wait_for_phase(&handle, "failed", Duration::from_secs(30))
            .await
    );

    let snapshot = handle.retry().await.unwrap();
    assert_eq!(snapshot.remaining_secs, Some(180));

    assert!(
        harness
            .wait_for_phase(&handle, "payment_received", Duration::from_secs(30))
            .await
    );

    let transitions = harness.phase_changes();
    let received_count = transitions
        .iter()
        .filter(|p| p.as_str() == "payment_received")
        .count();
    assert_eq!(received_count, 2);
}

// =============================================================================
// Guard Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_reserve_while_window_open_is_rejected() {
    let harness = TestHarness::new();
    harness
        .transport
        .push_script(vec![ScriptStep::silence(Duration::from_secs(3600))])
        .await;
    let handle = harness.spawn_coordinator();

    handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();

    let err = handle
        .reserve(fixtures::reservation_request("show-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidTransition { .. }));

    // Only one reserve call reached the booking service.
    assert_eq!(harness.client.call_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_while_non_terminal_is_rejected() {
    let harness = TestHarness::new();
    harness
        .transport
        .push_script(vec![ScriptStep::silence(Duration::from_secs(3600))])
        .await;
    let handle = harness.spawn_coordinator();

    handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();

    let err = handle.retry().await.unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::InvalidTransition {
            operation: "retry",
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_transient_reserve_error_makes_no_state_entry() {
    let harness = TestHarness::new();
    harness
        .client
        .queue_error(ReserveError::Transient("connection refused".to_string()))
        .await;
    harness
        .transport
        .push_script(happy_path_script(Duration::from_secs(1)))
        .await;
    let handle = harness.spawn_coordinator();

    let err = handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Reserve(ReserveError::Transient(_))
    ));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, ReservationPhase::Idle);

    // The user action can be retried from scratch.
    let snapshot = handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();
    assert_eq!(snapshot.phase, ReservationPhase::AwaitingPayment);
}

#[tokio::test(start_paused = true)]
async fn test_channel_drop_without_terminal_event_is_not_failure() {
    let harness = TestHarness::new();
    // Channel delivers payment_received, then the stream ends.
    harness
        .transport
        .push_script(vec![ScriptStep::status(
            Duration::from_secs(1),
            PaymentStatus::PaymentReceived,
            ts(1),
        )])
        .await;
    let handle = harness.spawn_with_window(20);

    handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();
    assert!(
        harness
            .wait_for_phase(&handle, "payment_received", Duration::from_secs(10))
            .await
    );

    // Disconnection alone must not flip the phase to failed; the timer is
    // the sole backstop for "nothing happened".
    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, ReservationPhase::PaymentReceived);
    assert!(!snapshot.channel_connected);

    assert!(
        harness
            .wait_for_phase(&handle, "expired", Duration::from_secs(30))
            .await
    );
}

#[tokio::test(start_paused = true)]
async fn test_countdown_ticks_update_remaining() {
    let harness = TestHarness::new();
    harness
        .transport
        .push_script(vec![ScriptStep::silence(Duration::from_secs(3600))])
        .await;
    let handle = harness.spawn_with_window(30);

    handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    let snapshot = handle.snapshot().await.unwrap();
    let remaining = snapshot.remaining_secs.unwrap();
    assert!(remaining < 30, "remaining = {}", remaining);

    let countdowns = harness
        .updates
        .lock()
        .unwrap()
        .iter()
        .filter(|u| matches!(u, ReservationUpdate::Countdown { .. }))
        .count();
    assert!(countdowns > 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_tears_everything_down() {
    let harness = TestHarness::new();
    harness
        .transport
        .push_script(vec![ScriptStep::silence(Duration::from_secs(3600))])
        .await;
    let handle = harness.spawn_coordinator();

    handle
        .reserve(fixtures::reservation_request("show-1"))
        .await
        .unwrap();
    handle.cancel().await;

    // The coordinator is gone; subsequent calls report it closed.
    let err = handle.snapshot().await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Closed));
}

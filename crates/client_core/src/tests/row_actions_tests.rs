use super::*;
use crate::{
    refresh::RefreshPhase,
    test_support::{vehicle, FakeFleetApi},
};

fn fleet() -> Vec<Vehicle> {
    vec![
        vehicle("VH-1", VehicleStatus::Available, None, 10),
        vehicle("VH-2", VehicleStatus::InRide, Some("DR-2001"), 20),
    ]
}

fn controllers(api: &Arc<FakeFleetApi>) -> (Arc<RefreshController>, Arc<RowActionController>) {
    let refresher = RefreshController::new(api.clone(), fleet());
    let rows = RowActionController::new(api.clone(), refresher.clone());
    (refresher, rows)
}

fn vh(id: &str) -> VehicleId {
    VehicleId::from(id)
}

#[tokio::test]
async fn same_status_sends_nothing() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (_refresher, rows) = controllers(&api);

    let outcome = rows.set_status(&vh("VH-1"), VehicleStatus::Available).await;

    assert_eq!(outcome, ActionOutcome::Skipped(SkipReason::Unchanged));
    assert!(api.status_calls().is_empty());
    assert_eq!(api.fetch_calls(), 0);
}

#[tokio::test]
async fn status_change_is_followed_by_a_refresh() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (refresher, rows) = controllers(&api);

    let outcome = rows.set_status(&vh("VH-1"), VehicleStatus::Maintenance).await;

    let ActionOutcome::Applied(updated) = outcome else {
        panic!("expected applied, got {outcome:?}");
    };
    assert_eq!(updated.status, VehicleStatus::Maintenance);
    assert_eq!(
        api.status_calls(),
        vec![(vh("VH-1"), VehicleStatus::Maintenance)]
    );
    assert_eq!(api.fetch_calls(), 1);
    assert_eq!(
        refresher.vehicle(&vh("VH-1")).map(|v| v.status),
        Some(VehicleStatus::Maintenance)
    );
    assert!(!rows.is_busy(&vh("VH-1")));
}

#[tokio::test]
async fn whitespace_draft_unassigns() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (refresher, rows) = controllers(&api);

    rows.update_draft(&vh("VH-2"), "   ");
    let outcome = rows.save_driver(&vh("VH-2")).await;

    assert!(matches!(outcome, ActionOutcome::Applied(_)));
    assert_eq!(api.assign_calls(), vec![(vh("VH-2"), None)]);
    assert_eq!(refresher.vehicle(&vh("VH-2")).and_then(|v| v.driver), None);
}

#[tokio::test]
async fn draft_is_trimmed_before_sending() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (refresher, rows) = controllers(&api);

    rows.update_draft(&vh("VH-1"), "  Alex ");
    rows.save_driver(&vh("VH-1")).await;

    assert_eq!(
        api.assign_calls(),
        vec![(vh("VH-1"), Some("Alex".to_string()))]
    );
    assert_eq!(
        refresher.vehicle(&vh("VH-1")).and_then(|v| v.driver).as_deref(),
        Some("Alex")
    );
    assert_eq!(rows.draft(&vh("VH-1")), "  Alex ");
}

#[tokio::test]
async fn missing_draft_saves_as_unassigned() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (_refresher, rows) = controllers(&api);

    rows.save_driver(&vh("VH-2")).await;

    assert_eq!(api.assign_calls(), vec![(vh("VH-2"), None)]);
}

#[tokio::test]
async fn clear_ignores_draft_and_empties_it() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (_refresher, rows) = controllers(&api);

    rows.update_draft(&vh("VH-2"), "DR-9999");
    let outcome = rows.clear_driver(&vh("VH-2")).await;

    assert!(matches!(outcome, ActionOutcome::Applied(ref v) if v.driver.is_none()));
    assert_eq!(api.assign_calls(), vec![(vh("VH-2"), None)]);
    assert_eq!(rows.draft(&vh("VH-2")), "");
}

#[tokio::test]
async fn failed_clear_keeps_the_draft() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (_refresher, rows) = controllers(&api);
    api.fail_mutations(Some("boom"));

    rows.update_draft(&vh("VH-2"), "DR-9999");
    let outcome = rows.clear_driver(&vh("VH-2")).await;

    assert_eq!(outcome, ActionOutcome::Failed("boom".to_string()));
    assert_eq!(rows.draft(&vh("VH-2")), "DR-9999");
}

#[tokio::test]
async fn failure_clears_busy_and_skips_refresh() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (refresher, rows) = controllers(&api);
    let mut events = refresher.subscribe();
    api.fail_mutations(Some("Invalid status"));

    let outcome = rows.set_status(&vh("VH-1"), VehicleStatus::InRide).await;

    assert_eq!(outcome, ActionOutcome::Failed("Invalid status".to_string()));
    assert!(!rows.is_busy(&vh("VH-1")));
    assert_eq!(api.fetch_calls(), 0);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&DashboardEvent::ActionFailed {
        vehicle_id: vh("VH-1"),
        message: "Invalid status".to_string(),
    }));
    assert_eq!(
        seen.last(),
        Some(&DashboardEvent::ActionFailed {
            vehicle_id: vh("VH-1"),
            message: "Invalid status".to_string(),
        })
    );
}

#[tokio::test]
async fn unknown_vehicle_reports_not_found() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (_refresher, rows) = controllers(&api);

    let outcome = rows.set_status(&vh("VH-404"), VehicleStatus::InRide).await;

    assert_eq!(outcome, ActionOutcome::Failed("Vehicle not found".to_string()));
    assert!(!rows.is_busy(&vh("VH-404")));
}

#[tokio::test]
async fn busy_row_blocks_itself_but_not_other_rows() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (_refresher, rows) = controllers(&api);
    api.hold_mutations_for(&vh("VH-1"));

    let pending = {
        let rows = rows.clone();
        tokio::spawn(async move { rows.set_status(&vh("VH-1"), VehicleStatus::Maintenance).await })
    };
    api.mutation_started().await;

    assert!(rows.is_busy(&vh("VH-1")));
    assert!(!rows.is_busy(&vh("VH-2")));
    assert!(rows.snapshot().is_busy(&vh("VH-1")));

    assert_eq!(
        rows.set_status(&vh("VH-1"), VehicleStatus::InRide).await,
        ActionOutcome::Skipped(SkipReason::RowBusy)
    );
    assert_eq!(
        rows.save_driver(&vh("VH-1")).await,
        ActionOutcome::Skipped(SkipReason::RowBusy)
    );

    let other = rows.set_status(&vh("VH-2"), VehicleStatus::Available).await;
    assert!(matches!(other, ActionOutcome::Applied(_)));

    rows.update_draft(&vh("VH-1"), "typing while busy");
    assert_eq!(rows.draft(&vh("VH-1")), "typing while busy");

    api.release_mutations(1);
    let outcome = pending.await.expect("action task");
    assert!(matches!(outcome, ActionOutcome::Applied(_)));
    assert!(!rows.is_busy(&vh("VH-1")));
    assert_eq!(api.status_calls().len(), 2);
}

#[tokio::test]
async fn busy_flag_is_cleared_before_the_follow_up_refresh() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (refresher, rows) = controllers(&api);
    api.hold_fetches();

    let pending = {
        let rows = rows.clone();
        tokio::spawn(async move { rows.set_status(&vh("VH-1"), VehicleStatus::InRide).await })
    };
    api.fetch_started().await;

    assert_eq!(refresher.phase(), RefreshPhase::Refreshing);
    assert!(!rows.is_busy(&vh("VH-1")));

    api.release_fetches(1);
    pending.await.expect("action task");
    assert_eq!(refresher.phase(), RefreshPhase::Idle);
}

#[tokio::test]
async fn busy_changes_are_published() {
    let api = Arc::new(FakeFleetApi::new(fleet()));
    let (refresher, rows) = controllers(&api);
    let mut events = refresher.subscribe();

    rows.clear_driver(&vh("VH-2")).await;

    assert_eq!(
        events.recv().await.expect("event"),
        DashboardEvent::RowBusyChanged {
            vehicle_id: vh("VH-2"),
            busy: true,
        }
    );
    assert_eq!(
        events.recv().await.expect("event"),
        DashboardEvent::RowBusyChanged {
            vehicle_id: vh("VH-2"),
            busy: false,
        }
    );
    assert_eq!(
        events.recv().await.expect("event"),
        DashboardEvent::RefreshPhaseChanged(RefreshPhase::Refreshing)
    );
}

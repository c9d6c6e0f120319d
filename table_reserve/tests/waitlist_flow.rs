//! Integration tests for the waitlist queue: ordering, state machine and
//! expiry sweeps, run against the in-memory store.

use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use table_reserve::{
    TableStatus, TimeSlot,
    db::{InMemoryWaitlistRepository, WaitlistRepository},
    notify::{NotificationTemplate, mock::RecordingDispatcher},
    table::{LocationZone, Table},
    waitlist::{
        ContactInfo, Opening, PriorityTier, WaitlistConfig, WaitlistEntry, WaitlistError,
        WaitlistManager, WaitlistRequest, WaitlistStatus,
    },
};
use uuid::Uuid;

fn tomorrow() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(1)
}

fn seven_pm() -> TimeSlot {
    TimeSlot::from_hm(19, 0).unwrap()
}

fn request(name: &str, guests: u32, occasion: Option<&str>) -> WaitlistRequest {
    WaitlistRequest {
        contact: ContactInfo::new(name).with_email(format!("{}@example.com", name)),
        guest_count: guests,
        preferred_date: tomorrow(),
        time_slots: vec![seven_pm()],
        seating_preference: Default::default(),
        occasion: occasion.map(str::to_string),
        special_requests: None,
        dietary_notes: None,
    }
}

fn setup() -> (Arc<WaitlistManager>, Arc<InMemoryWaitlistRepository>, Arc<RecordingDispatcher>) {
    let repo = Arc::new(InMemoryWaitlistRepository::new());
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let manager = Arc::new(WaitlistManager::new(
        repo.clone(),
        dispatcher.clone(),
        WaitlistConfig::default(),
    ));
    (manager, repo, dispatcher)
}

#[tokio::test]
async fn test_priority_dominates_recency() {
    let (manager, _, _) = setup();

    let normal = manager.enqueue(request("ada", 2, None)).await.unwrap();
    let first_vip = manager
        .enqueue(request("bob", 2, Some("anniversary")))
        .await
        .unwrap();
    let second_vip = manager
        .enqueue(request("cy", 2, Some("Anniversary dinner")))
        .await
        .unwrap();

    assert_eq!(normal.priority, PriorityTier::Standard);
    assert_eq!(first_vip.priority, PriorityTier::SpecialOccasion);

    let positions = manager.recompute_positions().await.unwrap();
    assert_eq!(positions.len(), 3);

    assert_eq!(manager.get(first_vip.id).await.unwrap().position, Some(1));
    assert_eq!(manager.get(second_vip.id).await.unwrap().position, Some(2));
    assert_eq!(manager.get(normal.id).await.unwrap().position, Some(3));
}

#[tokio::test]
async fn test_large_parties_ahead_of_standard() {
    let (manager, _, _) = setup();

    let small = manager.enqueue(request("ada", 2, None)).await.unwrap();
    let large = manager.enqueue(request("bob", 8, None)).await.unwrap();

    assert_eq!(large.priority, PriorityTier::LargeParty);
    assert_eq!(large.position, Some(1));
    assert_eq!(manager.get(small.id).await.unwrap().position, Some(2));
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let (manager, _, _) = setup();
    for (name, occasion) in [("a", None), ("b", Some("birthday")), ("c", None)] {
        manager.enqueue(request(name, 2, occasion)).await.unwrap();
    }

    let first = manager.recompute_positions().await.unwrap();
    let second = manager.recompute_positions().await.unwrap();
    assert_eq!(first, second);

    let numbers: Vec<u32> = first.iter().map(|p| p.position).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_stale_notification_is_requeued() {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let stale = WaitlistEntry {
        id,
        name: "Ada".to_string(),
        email: Some("ada@example.com".to_string()),
        phone: None,
        guest_count: 2,
        preferred_date: tomorrow(),
        time_slots: vec![seven_pm()],
        seating_preference: Default::default(),
        occasion: None,
        special_requests: None,
        dietary_notes: None,
        status: WaitlistStatus::Notified,
        priority: PriorityTier::Standard,
        position: None,
        estimated_wait_minutes: None,
        notification_expiry: Some(now - Duration::minutes(31)),
        notified_at: Some(now - Duration::minutes(61)),
        queued_at: now - Duration::hours(2),
        created_at: now - Duration::hours(2),
        updated_at: now - Duration::minutes(61),
    };

    let repo = Arc::new(InMemoryWaitlistRepository::new().with_entry(stale));
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let manager = WaitlistManager::new(repo, dispatcher.clone(), WaitlistConfig::default());

    let report = manager.sweep_expired(now).await.unwrap();
    assert_eq!(report.requeued, vec![id]);
    assert!(report.failed.is_empty());

    let entry = manager.get(id).await.unwrap();
    assert_eq!(entry.status, WaitlistStatus::Pending);
    assert!(entry.position.is_some_and(|p| p >= 1));
    assert!(entry.notification_expiry.is_none());
    assert!(entry.queued_at > now - Duration::hours(2));

    assert_eq!(dispatcher.sent(), vec![(id, NotificationTemplate::Requeued)]);
}

#[tokio::test]
async fn test_confirm_and_cancel_leave_the_queue() {
    let (manager, _, _) = setup();
    let a = manager.enqueue(request("a", 2, None)).await.unwrap();
    let b = manager.enqueue(request("b", 2, None)).await.unwrap();
    let c = manager.enqueue(request("c", 2, None)).await.unwrap();

    manager.notify(a.id).await.unwrap();
    manager.confirm(a.id).await.unwrap();
    manager.cancel(b.id).await.unwrap();

    let pending = manager.pending_entries().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, c.id);
    assert_eq!(pending[0].position, Some(1));

    let cancelled = manager.get(b.id).await.unwrap();
    assert_eq!(cancelled.status, WaitlistStatus::Cancelled);
    assert_eq!(cancelled.position, None);
}

#[tokio::test]
async fn test_concurrent_confirms_have_one_winner() {
    let (manager, _, _) = setup();
    let entry = manager.enqueue(request("ada", 2, None)).await.unwrap();
    manager.notify(entry.id).await.unwrap();

    let (m1, m2) = (manager.clone(), manager.clone());
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { m1.confirm(entry.id).await }),
        tokio::spawn(async move { m2.cancel(entry.id).await }),
    );
    let results = [r1.unwrap(), r2.unwrap()];

    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(WaitlistError::InvalidState { .. })))
    );
}

#[tokio::test]
async fn test_next_candidate_respects_slots_and_size() {
    let (manager, _, _) = setup();
    let mut late = request("late", 2, None);
    late.time_slots = vec![TimeSlot::from_hm(21, 0).unwrap()];
    manager.enqueue(late).await.unwrap();
    manager.enqueue(request("big", 8, None)).await.unwrap();
    let fits = manager.enqueue(request("fits", 4, None)).await.unwrap();

    let opening = Opening {
        date: tomorrow(),
        time_slot: seven_pm(),
        table: Table::new(3, 3, 4, LocationZone::Indoor).with_status(TableStatus::Available),
    };
    let candidate = manager.next_candidate(&opening).await.unwrap().unwrap();
    assert_eq!(candidate.id, fits.id);
}

#[tokio::test]
async fn test_search_by_phone_matches_formatting_variants() {
    let (manager, repo, _) = setup();
    let mut req = request("ada", 2, None);
    req.contact = ContactInfo::new("Ada").with_phone("(555) 010-2000");
    let entry = manager.enqueue(req).await.unwrap();

    let found = manager
        .search(&table_reserve::waitlist::SearchCriteria::by_phone("555.010.2000"))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, entry.id);

    // The store keeps the normalized form
    let stored = repo.find(entry.id).await.unwrap().unwrap();
    assert_eq!(stored.phone.as_deref(), Some("5550102000"));
}

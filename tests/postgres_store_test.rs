//! Runs against a live database: `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::collections::HashSet;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use internship_allocation::{
    allocation::{
        postgres::OUTBOX_LOCK_KEY, Actor, AllocationCoordinator, AllocationError, OfferPolicy,
        PgAllocationStore, PlacementOutcome,
    },
    database::pool::run_migrations,
    models::{application::ApplicationStatus, event::AllocationEvent},
    utils::time::SystemClock,
};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn coordinator() -> AllocationCoordinator {
    dotenvy::dotenv().ok();
    let url = env::var("DATABASE_URL").expect("DATABASE_URL");
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&url)
        .await
        .expect("pool");
    run_migrations(&pool).await.expect("migrations");
    AllocationCoordinator::new(
        Arc::new(PgAllocationStore::new(pool)),
        Arc::new(SystemClock),
        OfferPolicy::default(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn concurrent_accepts_respect_capacity_in_postgres() {
    let coordinator = coordinator().await;
    let company = Actor::company(Uuid::new_v4());
    let vacancy = coordinator
        .create_vacancy(company, company.id, "Platform intern".into(), Some(2), None)
        .await
        .expect("vacancy");

    let mut offers = Vec::new();
    for _ in 0..8 {
        let student = Actor::student(Uuid::new_v4());
        let app = coordinator
            .apply(student, vacancy.id)
            .await
            .expect("apply")
            .application
            .id;
        coordinator
            .issue_offer(company, app, None)
            .await
            .expect("offer");
        offers.push((student, app));
    }

    let handles: Vec<_> = offers
        .into_iter()
        .map(|(student, app)| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.accept_offer(student, app).await })
        })
        .collect();
    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert_eq!(err, AllocationError::CapacityExhausted),
        }
    }
    assert_eq!(accepted, 2);
    assert_eq!(coordinator.vacancy(vacancy.id).await.unwrap().spots_taken, 2);
}

#[tokio::test]
#[ignore]
async fn single_placement_and_release_in_postgres() {
    let coordinator = coordinator().await;
    let company = Actor::company(Uuid::new_v4());
    let student = Actor::student(Uuid::new_v4());

    let mut apps = Vec::new();
    for _ in 0..2 {
        let vacancy = coordinator
            .create_vacancy(company, company.id, "Support intern".into(), None, None)
            .await
            .expect("vacancy");
        let app = coordinator
            .apply(student, vacancy.id)
            .await
            .expect("apply")
            .application
            .id;
        coordinator
            .issue_offer(company, app, Some(2))
            .await
            .expect("offer");
        apps.push(app);
    }

    coordinator
        .accept_offer(student, apps[0])
        .await
        .expect("first accept");
    assert_eq!(
        coordinator.accept_offer(student, apps[1]).await.unwrap_err(),
        AllocationError::StudentAlreadyPlaced
    );

    let closed = coordinator
        .close_placement(company, apps[0], PlacementOutcome::Completed)
        .await
        .expect("close");
    assert_eq!(closed.application.status, ApplicationStatus::Completada);
    assert_eq!(closed.seats.spots_taken, 0);

    coordinator
        .accept_offer(student, apps[1])
        .await
        .expect("free to accept after closing");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn rejection_racing_withdrawal_in_postgres() {
    let coordinator = coordinator().await;
    let company = Actor::company(Uuid::new_v4());
    let vacancy = coordinator
        .create_vacancy(company, company.id, "Design intern".into(), Some(5), None)
        .await
        .expect("vacancy");

    for _ in 0..20 {
        let student = Actor::student(Uuid::new_v4());
        let app = coordinator
            .apply(student, vacancy.id)
            .await
            .expect("apply")
            .application
            .id;
        coordinator
            .issue_offer(company, app, None)
            .await
            .expect("offer");

        let reject = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.reject(company, app).await })
        };
        let withdraw = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.withdraw(student, app).await })
        };
        let results = [reject.await.unwrap(), withdraw.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(AllocationError::InvalidStateTransition { .. })
        )));
    }
}

/// Drains the feed the way a consumer does, following `next_after`.
async fn follow_feed(
    coordinator: &AllocationCoordinator,
    cursor: &mut i64,
) -> Vec<AllocationEvent> {
    let mut seen = Vec::new();
    loop {
        let page = coordinator.events_after(*cursor, 50).await.expect("events");
        match page.last() {
            Some(last) => *cursor = last.sequence,
            None => return seen,
        }
        seen.extend(page);
    }
}

/// Sequences of the events that belong to `applications`; other tests share the table.
fn sequences_for(events: &[AllocationEvent], applications: &HashSet<Uuid>) -> Vec<i64> {
    events
        .iter()
        .filter(|event| applications.contains(&event.application_id))
        .map(|event| event.sequence)
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn outbox_writer_waits_for_an_open_outbox_transaction() {
    let coordinator = coordinator().await;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&env::var("DATABASE_URL").expect("DATABASE_URL"))
        .await
        .expect("pool");
    let company = Actor::company(Uuid::new_v4());
    let student = Actor::student(Uuid::new_v4());
    let vacancy = coordinator
        .create_vacancy(company, company.id, "Infra intern".into(), None, None)
        .await
        .expect("vacancy");
    let app = coordinator
        .apply(student, vacancy.id)
        .await
        .expect("apply")
        .application
        .id;
    let mut cursor = 0;
    follow_feed(&coordinator, &mut cursor).await;
    let ours = HashSet::from([app]);

    // Another writer is mid-way through its outbox insert.
    let mut held = pool.begin().await.expect("begin");
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(OUTBOX_LOCK_KEY)
        .execute(&mut *held)
        .await
        .expect("advisory lock");

    let offer = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.issue_offer(company, app, None).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!offer.is_finished(), "outbox insert must queue behind the open writer");
    assert!(sequences_for(&follow_feed(&coordinator, &mut cursor).await, &ours).is_empty());

    held.commit().await.expect("commit");
    offer.await.unwrap().expect("offer");
    let after = follow_feed(&coordinator, &mut cursor).await;
    assert_eq!(sequences_for(&after, &ours).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn feed_consumer_sees_every_event_under_parallel_writers() {
    let coordinator = coordinator().await;
    let company = Actor::company(Uuid::new_v4());
    let mut start = 0;
    follow_feed(&coordinator, &mut start).await;

    let mut pending = Vec::new();
    for _ in 0..16 {
        let vacancy = coordinator
            .create_vacancy(company, company.id, "Parallel intern".into(), Some(2), None)
            .await
            .expect("vacancy");
        let student = Actor::student(Uuid::new_v4());
        let app = coordinator
            .apply(student, vacancy.id)
            .await
            .expect("apply")
            .application
            .id;
        pending.push((student, app));
    }
    let ours: HashSet<Uuid> = pending.iter().map(|(_, app)| *app).collect();

    let writers: Vec<_> = pending
        .into_iter()
        .map(|(student, app)| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator.issue_offer(company, app, None).await?;
                coordinator.accept_offer(student, app).await
            })
        })
        .collect();

    let mut cursor = start;
    let mut followed = Vec::new();
    while writers.iter().any(|w| !w.is_finished()) {
        followed.extend(follow_feed(&coordinator, &mut cursor).await);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    for writer in writers {
        writer.await.unwrap().expect("offer and accept");
    }
    followed.extend(follow_feed(&coordinator, &mut cursor).await);

    let mut from_start = start;
    let everything = follow_feed(&coordinator, &mut from_start).await;
    let expected = sequences_for(&everything, &ours);
    assert_eq!(expected.len(), 32);
    assert_eq!(
        sequences_for(&followed, &ours),
        expected,
        "consumer following next_after missed events"
    );
}

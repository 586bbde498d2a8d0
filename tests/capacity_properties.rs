use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use internship_allocation::{
    allocation::{
        Actor, AllocationCoordinator, AllocationResult, MemoryAllocationStore, OfferPolicy,
        PlacementOutcome, TransitionOutcome,
    },
    models::application::ApplicationStatus,
    utils::time::ManualClock,
};
use proptest::prelude::*;
use uuid::Uuid;

const STUDENTS: usize = 4;
const VACANCIES: usize = 2;

#[derive(Debug, Clone)]
enum Op {
    Apply(usize, usize),
    Offer(usize, usize, u32),
    Accept(usize, usize),
    Decline(usize, usize),
    Reject(usize, usize),
    Withdraw(usize, usize),
    Close(usize, usize, bool),
    Resize(usize, i32),
    Toggle(usize, bool),
    Advance(i64),
    Sweep,
}

fn op() -> impl Strategy<Value = Op> {
    let s = 0..STUDENTS;
    let v = 0..VACANCIES;
    prop_oneof![
        3 => (s.clone(), v.clone()).prop_map(|(s, v)| Op::Apply(s, v)),
        3 => (s.clone(), v.clone(), 1u32..4).prop_map(|(s, v, d)| Op::Offer(s, v, d)),
        4 => (s.clone(), v.clone()).prop_map(|(s, v)| Op::Accept(s, v)),
        1 => (s.clone(), v.clone()).prop_map(|(s, v)| Op::Decline(s, v)),
        1 => (s.clone(), v.clone()).prop_map(|(s, v)| Op::Reject(s, v)),
        1 => (s.clone(), v.clone()).prop_map(|(s, v)| Op::Withdraw(s, v)),
        1 => (s.clone(), v.clone(), any::<bool>()).prop_map(|(s, v, c)| Op::Close(s, v, c)),
        1 => (v.clone(), 1i32..4).prop_map(|(v, n)| Op::Resize(v, n)),
        1 => (v, any::<bool>()).prop_map(|(v, a)| Op::Toggle(v, a)),
        1 => (1i64..72).prop_map(Op::Advance),
        1 => Just(Op::Sweep),
    ]
}

struct World {
    coordinator: AllocationCoordinator,
    clock: Arc<ManualClock>,
    company: Actor,
    students: Vec<Actor>,
    vacancies: Vec<Uuid>,
    applications: HashMap<(usize, usize), Uuid>,
}

impl World {
    async fn new(capacities: &[i32]) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap(),
        ));
        let coordinator = AllocationCoordinator::new(
            Arc::new(MemoryAllocationStore::new()),
            clock.clone(),
            OfferPolicy::default(),
        );
        let company = Actor::company(Uuid::new_v4());
        let mut vacancies = Vec::new();
        for spots in capacities {
            let vacancy = coordinator
                .create_vacancy(company, company.id, "Data intern".into(), Some(*spots), None)
                .await
                .expect("create vacancy");
            vacancies.push(vacancy.id);
        }
        Self {
            coordinator,
            clock,
            company,
            students: (0..STUDENTS).map(|_| Actor::student(Uuid::new_v4())).collect(),
            vacancies,
            applications: HashMap::new(),
        }
    }

    async fn run(&mut self, op: Op) -> Result<(), String> {
        let outcome: Option<AllocationResult<TransitionOutcome>> = match op {
            Op::Apply(s, v) => {
                let result = self
                    .coordinator
                    .apply(self.students[s], self.vacancies[v])
                    .await;
                if let Ok(outcome) = &result {
                    self.applications.insert((s, v), outcome.application.id);
                }
                Some(result)
            }
            Op::Offer(s, v, days) => match self.applications.get(&(s, v)) {
                Some(id) => Some(self.coordinator.issue_offer(self.company, *id, Some(days)).await),
                None => None,
            },
            Op::Accept(s, v) => match self.applications.get(&(s, v)) {
                Some(id) => Some(self.coordinator.accept_offer(self.students[s], *id).await),
                None => None,
            },
            Op::Decline(s, v) => match self.applications.get(&(s, v)) {
                Some(id) => Some(self.coordinator.decline_offer(self.students[s], *id).await),
                None => None,
            },
            Op::Reject(s, v) => match self.applications.get(&(s, v)) {
                Some(id) => Some(self.coordinator.reject(self.company, *id).await),
                None => None,
            },
            Op::Withdraw(s, v) => match self.applications.get(&(s, v)) {
                Some(id) => Some(self.coordinator.withdraw(self.students[s], *id).await),
                None => None,
            },
            Op::Close(s, v, completed) => match self.applications.get(&(s, v)) {
                Some(id) => {
                    let outcome = if completed {
                        PlacementOutcome::Completed
                    } else {
                        PlacementOutcome::Terminated
                    };
                    Some(self.coordinator.close_placement(self.company, *id, outcome).await)
                }
                None => None,
            },
            Op::Resize(v, n) => {
                if let Err(err) = self
                    .coordinator
                    .resize_vacancy(self.company, self.vacancies[v], n)
                    .await
                {
                    if err.is_fatal() {
                        return Err(err.to_string());
                    }
                }
                None
            }
            Op::Toggle(v, active) => {
                self.coordinator
                    .toggle_status(self.company, self.vacancies[v], active)
                    .await
                    .map_err(|e| e.to_string())?;
                None
            }
            Op::Advance(hours) => {
                self.clock.advance(Duration::hours(hours));
                None
            }
            Op::Sweep => {
                self.coordinator
                    .sweep_expired_offers(50)
                    .await
                    .map_err(|e| e.to_string())?;
                None
            }
        };
        match outcome {
            Some(Err(err)) if err.is_fatal() => Err(err.to_string()),
            _ => Ok(()),
        }
    }

    async fn check(&self) -> Result<(), String> {
        let mut placements: HashMap<Uuid, usize> = HashMap::new();
        for vacancy_id in &self.vacancies {
            let vacancy = self
                .coordinator
                .vacancy(*vacancy_id)
                .await
                .map_err(|e| e.to_string())?;
            if vacancy.spots_taken < 0 || vacancy.spots_taken > vacancy.spots_total {
                return Err(format!(
                    "vacancy out of range: {}/{}",
                    vacancy.spots_taken, vacancy.spots_total
                ));
            }
            let accepted: Vec<_> = self
                .coordinator
                .applications_for_vacancy(self.company, *vacancy_id)
                .await
                .map_err(|e| e.to_string())?
                .into_iter()
                .filter(|app| app.status == ApplicationStatus::Aceptada)
                .collect();
            if accepted.len() as i32 != vacancy.spots_taken {
                return Err(format!(
                    "spots_taken {} but {} accepted applications",
                    vacancy.spots_taken,
                    accepted.len()
                ));
            }
            for app in accepted {
                *placements.entry(app.student_id).or_default() += 1;
            }
        }
        match placements.values().find(|count| **count > 1) {
            Some(count) => Err(format!("student holds {count} placements")),
            None => Ok(()),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn seats_and_placements_stay_consistent(
        capacities in proptest::collection::vec(1i32..3, VACANCIES),
        ops in proptest::collection::vec(op(), 1..60),
    ) {
        let result: Result<(), String> = tokio_test::block_on(async {
            let mut world = World::new(&capacities).await;
            for op in ops {
                world.run(op).await?;
                world.check().await?;
            }
            Ok(())
        });
        prop_assert!(result.is_ok(), "{:?}", result);
    }
}

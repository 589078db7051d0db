use async_trait::async_trait;
use course_registry::domain::ports::{CourseListCache, EnrollmentLedger, NotificationSink};
use course_registry::{
    App, AppConfig, Caller, DomainEvent, Entity, NewCourse, NewStudent, RegistryError,
    SqliteStore, TtlCache,
};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl RecordingSink {
    fn course_full_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, DomainEvent::CourseFull { .. }))
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, event: DomainEvent) -> course_registry::Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

fn app_with_recorder() -> (App, RecordingSink) {
    let recorder = RecordingSink::default();
    let app = App::with_components(
        SqliteStore::open_in_memory().unwrap(),
        Arc::new(TtlCache::default()),
        Arc::new(recorder.clone()),
    );
    (app, recorder)
}

async fn add_student(app: &App, n: usize) -> i64 {
    app.catalog
        .create_student(NewStudent {
            name: format!("Student {}", n),
            email: format!("student{}@uni.example", n),
            credential_hash: "hash".to_string(),
            phone_number: None,
        })
        .await
        .unwrap()
        .id
}

async fn add_course(app: &App, code: &str, max_students: u32) -> i64 {
    app.catalog
        .create_course(NewCourse {
            name: format!("Course {}", code),
            code: code.to_string(),
            max_students: Some(max_students),
            ..Default::default()
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_unknown_student_is_not_found() {
    let (app, _) = app_with_recorder();
    let course = add_course(&app, "CS101", 3).await;

    let result = app.desk.service().enroll(999, course).await;
    assert!(matches!(result, Err(RegistryError::NotFound(Entity::Student))));
}

#[tokio::test]
async fn test_enrolling_twice_is_already_registered() {
    let (app, _) = app_with_recorder();
    let student = add_student(&app, 1).await;
    let course = add_course(&app, "CS101", 3).await;
    let service = app.desk.service();

    service.enroll(student, course).await.unwrap();
    let second = service.enroll(student, course).await;

    assert!(matches!(second, Err(RegistryError::AlreadyRegistered)));
    assert_eq!(app.store.count_for_student(student).await.unwrap(), 1);
    assert_eq!(app.store.count_for_course(course).await.unwrap(), 1);
}

#[tokio::test]
async fn test_fourth_course_is_refused() {
    let (app, _) = app_with_recorder();
    let student = add_student(&app, 1).await;
    let service = app.desk.service();
    for code in ["A", "B", "C"] {
        let course = add_course(&app, code, 3).await;
        service.enroll(student, course).await.unwrap();
    }
    let fourth = add_course(&app, "D", 3).await;

    let result = service.enroll(student, fourth).await;

    assert!(matches!(result, Err(RegistryError::LimitReached { limit: 3 })));
    assert_eq!(app.store.count_for_student(student).await.unwrap(), 3);
}

#[tokio::test]
async fn test_full_course_is_refused() {
    let (app, recorder) = app_with_recorder();
    let course = add_course(&app, "SEM1", 1).await;
    let first = add_student(&app, 1).await;
    let second = add_student(&app, 2).await;
    let service = app.desk.service();

    service.enroll(first, course).await.unwrap();
    let result = service.enroll(second, course).await;

    assert!(matches!(
        result,
        Err(RegistryError::CapacityReached { max_students: 1 })
    ));
    assert_eq!(recorder.course_full_count(), 1);
}

#[tokio::test]
async fn test_unregistering_unknown_pair_leaves_ledger_alone() {
    let (app, _) = app_with_recorder();
    let student = add_student(&app, 1).await;
    let enrolled = add_course(&app, "IN", 3).await;
    let other = add_course(&app, "OUT", 3).await;
    let service = app.desk.service();
    service.enroll(student, enrolled).await.unwrap();

    assert!(!service.unregister(student, other).await.unwrap());
    assert_eq!(app.store.count_for_student(student).await.unwrap(), 1);
}

#[tokio::test]
async fn test_unregister_twice_fails_cleanly_the_second_time() {
    let (app, _) = app_with_recorder();
    let student = add_student(&app, 1).await;
    let course = add_course(&app, "HIST2", 3).await;
    let service = app.desk.service();
    service.enroll(student, course).await.unwrap();

    assert!(service.unregister(student, course).await.unwrap());
    assert!(!service.unregister(student, course).await.unwrap());
    assert!(!app.store.exists(student, course).await.unwrap());
}

#[tokio::test]
async fn test_course_list_reflects_writes_despite_warm_cache() {
    let (app, _) = app_with_recorder();
    let student = add_student(&app, 1).await;
    let first = add_course(&app, "ART1", 3).await;
    let second = add_course(&app, "ART2", 3).await;
    let service = app.desk.service();

    service.enroll(student, first).await.unwrap();
    assert_eq!(service.student_courses(student).await.unwrap().len(), 1);
    assert!(app.cache.get(student).is_some());

    service.enroll(student, second).await.unwrap();
    let ids: Vec<i64> = service
        .student_courses(student)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![first, second]);

    service.unregister(student, first).await.unwrap();
    let ids: Vec<i64> = service
        .student_courses(student)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![second]);
}

#[tokio::test]
async fn test_deleting_course_cascades_and_clears_cached_lists() {
    let (app, _) = app_with_recorder();
    let student = add_student(&app, 1).await;
    let course = add_course(&app, "GONE", 3).await;
    let service = app.desk.service();
    service.enroll(student, course).await.unwrap();
    service.student_courses(student).await.unwrap();

    assert!(app.catalog.delete_course(course).await.unwrap());

    assert!(app.cache.get(student).is_none());
    assert!(service.student_courses(student).await.unwrap().is_empty());
    assert_eq!(app.store.count_for_student(student).await.unwrap(), 0);
}

#[tokio::test]
async fn test_new_account_emits_student_registered() {
    let (app, recorder) = app_with_recorder();
    let id = add_student(&app, 7).await;

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![DomainEvent::StudentRegistered {
            student_id: id,
            name: "Student 7".to_string(),
            email: "student7@uni.example".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_invariants_hold_over_mixed_sequence() {
    let (app, _) = app_with_recorder();
    let service = app.desk.service();

    let mut students = Vec::new();
    for n in 0..6 {
        students.push(add_student(&app, n).await);
    }
    let mut courses = Vec::new();
    for (code, seats) in [("K1", 1), ("K2", 2), ("K3", 3), ("K4", 5)] {
        courses.push((add_course(&app, code, seats).await, seats as usize));
    }

    // Deterministic walk: mostly enrolls, every fifth step withdraws.
    for step in 0..120usize {
        let student = students[(step * 7 + 3) % students.len()];
        let (course, _) = courses[(step * 5 + step / 4) % courses.len()];
        if step % 5 == 4 {
            service.unregister(student, course).await.unwrap();
        } else {
            let _ = service.enroll(student, course).await;
        }

        for &s in &students {
            assert!(app.store.count_for_student(s).await.unwrap() <= 3);
        }
        for &(c, seats) in &courses {
            assert!(app.store.count_for_course(c).await.unwrap() <= seats);
        }
    }
}

#[tokio::test]
async fn test_app_builds_from_config_and_drains_queue() {
    let config = AppConfig::from_toml_str(
        r#"
[database]
path = ":memory:"

[notifications]
queued = true
queue_capacity = 8
"#,
    )
    .unwrap();

    let app = App::build(&config).await.unwrap();
    let student = add_student(&app, 1).await;
    let course = add_course(&app, "Q1", 1).await;

    let response = app.desk.enroll(Caller(student), student, course).await;
    assert_eq!(response.status, 200);

    let refused = app.desk.enroll(Caller(student), student, course).await;
    assert_eq!(refused.status, 409);

    app.shutdown().await;
}

mod common;

use axum::http::StatusCode;
use common::*;
use stadion_core::Role;

fn tennis_coach() -> Vec<(&'static str, &'static str)> {
    vec![
        ("specialty", "Tennis"),
        ("bio", "Former club champion."),
        ("is_available", "true"),
        ("services_count", "1"),
        ("services[0].service_name", "Private lesson"),
        ("services[0].duration_minutes", "60"),
        ("services[0].price", "80"),
        ("availability_count", "1"),
        ("availability[0].day_of_week", "1"),
        ("availability[0].start_time", "08:00"),
        ("availability[0].end_time", "12:00"),
    ]
}

fn replace(fields: &mut Vec<(&'static str, &'static str)>, key: &'static str, value: &'static str) {
    fields.retain(|(k, _)| *k != key);
    fields.push((key, value));
}

#[tokio::test]
async fn instructor_creates_a_profile_with_services() {
    let backend = FakeBackend::default();
    let (user, token) = backend.user("coach@example.com", Some("INSTRUCTOR"));
    let app = app(&backend);

    let response = send(&app, post_form("/instructors", Some(&token), &tennis_coach())).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/instructors?message=Instructor+profile+created+successfully%21"
    );

    let world = backend.world.lock();
    assert_eq!(world.instructor_inserts.len(), 1);
    let inserted = &world.instructor_inserts[0];
    assert_eq!(inserted.user_id, user.id);
    assert_eq!(inserted.specialty, "Tennis");
    assert!(inserted.is_available);
    assert_eq!(inserted.services.len(), 1);
    assert_eq!(inserted.services[0].duration_minutes, 60);
    assert_eq!(inserted.availability_rules.len(), 1);
    assert_eq!(inserted.availability_rules[0].day_of_week, 1);
}

#[tokio::test]
async fn short_specialty_is_rejected_without_insert() {
    let backend = FakeBackend::default();
    let (_, token) = backend.user("coach@example.com", Some("INSTRUCTOR"));
    let app = app(&backend);

    let mut fields = tennis_coach();
    replace(&mut fields, "specialty", "Te");
    let response = send(&app, post_form("/instructors", Some(&token), &fields)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("Specialty must be at least 3 characters."));
    assert_eq!(backend.world.lock().instructor_attempts, 0);
}

#[tokio::test]
async fn short_service_duration_is_rejected_without_insert() {
    let backend = FakeBackend::default();
    let (_, token) = backend.user("coach@example.com", Some("INSTRUCTOR"));
    let app = app(&backend);

    let mut fields = tennis_coach();
    replace(&mut fields, "services[0].duration_minutes", "10");
    let response = send(&app, post_form("/instructors", Some(&token), &fields)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let html = body_text(response).await;
    assert!(html.contains("Service 1: minimum duration is 15 minutes."));
    assert!(html.contains("value=\"Private lesson\""));
    assert_eq!(backend.world.lock().instructor_attempts, 0);
}

#[tokio::test]
async fn existing_profile_redirects_every_visit() {
    let backend = FakeBackend::default();
    let (_, token) = backend.user("coach@example.com", Some("INSTRUCTOR"));
    let app = app(&backend);
    send(&app, post_form("/instructors", Some(&token), &tennis_coach())).await;

    for _ in 0..2 {
        let response = send(&app, get("/instructors/new", Some(&token))).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            "/instructors?message=You+already+have+an+instructor+profile."
        );
    }
}

#[tokio::test]
async fn second_profile_post_is_refused() {
    let backend = FakeBackend::default();
    let (_, token) = backend.user("coach@example.com", Some("INSTRUCTOR"));
    let app = app(&backend);
    send(&app, post_form("/instructors", Some(&token), &tennis_coach())).await;

    let response = send(&app, post_form("/instructors", Some(&token), &tennis_coach())).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("You already have an instructor profile."));
    assert_eq!(backend.world.lock().instructor_inserts.len(), 1);
}

#[tokio::test]
async fn legacy_role_is_normalized_on_visit() {
    let backend = FakeBackend::default();
    let (user, token) = backend.user("coach@example.com", Some(" Professor "));
    let app = app(&backend);

    let response = send(&app, get("/instructors/new?services=3", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("name=\"services[2].service_name\""));
    assert_eq!(backend.stored_role(user.id).as_deref(), Some("INSTRUCTOR"));
}

#[tokio::test]
async fn legacy_role_is_left_alone_when_rewrite_is_off() {
    let backend = FakeBackend::default();
    let (user, token) = backend.user("coach@example.com", Some("instrutor"));
    let mut config = test_config();
    config.legacy_role_rewrite = false;
    let app = app_with(&backend, config);

    let response = send(&app, get("/instructors/new", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.stored_role(user.id).as_deref(), Some("instrutor"));
}

#[tokio::test]
async fn non_instructor_is_sent_back_to_the_listing() {
    let backend = FakeBackend::default();
    let (_, token) = backend.user("manager@example.com", Some("FACILITY_MANAGER"));
    let app = app(&backend);

    let response = send(&app, get("/instructors/new", Some(&token))).await;
    assert_redirect(&response, "/instructors?message=");

    let response = send(&app, post_form("/instructors", Some(&token), &tennis_coach())).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_text(response).await.contains("Only instructors can create an instructor profile."));
    assert_eq!(backend.world.lock().instructor_attempts, 0);
}

#[tokio::test]
async fn policy_rejection_is_retried_once_after_normalizing() {
    let backend = FakeBackend::default();
    let (user, token) = backend.user("coach@example.com", Some("professor"));
    backend.world.lock().rls_rejections = 1;
    let mut config = test_config();
    config.legacy_role_rewrite = false;
    let app = app_with(&backend, config);

    let response = send(&app, post_form("/instructors", Some(&token), &tennis_coach())).await;
    assert_redirect(&response, "/instructors?message=Instructor+profile+created");

    let world = backend.world.lock();
    assert_eq!(world.instructor_attempts, 2);
    assert_eq!(world.instructor_inserts.len(), 1);
    assert_eq!(world.role_updates, vec![(user.id, Role::Instructor)]);
}

#[tokio::test]
async fn persistent_policy_rejection_reports_a_support_code() {
    let backend = FakeBackend::default();
    let (user, token) = backend.user("coach@example.com", Some("INSTRUCTOR"));
    backend.world.lock().rls_rejections = 2;
    let app = app(&backend);

    let response = send(&app, post_form("/instructors", Some(&token), &tennis_coach())).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let code: String = user.id.to_string().chars().take(8).collect();
    let html = body_text(response).await;
    assert!(html.contains(&format!("RLS-AUTH-FAIL-{}", code)));
    assert_eq!(backend.world.lock().instructor_attempts, 2);
    assert!(backend.world.lock().instructor_inserts.is_empty());
}

#[tokio::test]
async fn listing_shows_display_names() {
    let backend = FakeBackend::default();
    let (_, token) = backend.user("coach@example.com", Some("INSTRUCTOR"));
    let app = app(&backend);
    send(&app, post_form("/instructors", Some(&token), &tennis_coach())).await;

    let html = body_text(send(&app, get("/instructors", None)).await).await;
    assert!(html.contains("<h2>coach</h2>"));
    assert!(html.contains("Tennis"));
    assert!(!html.contains("href=\"/instructors/new\""));

    let response = send(&app, get("/api/instructors", None)).await;
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body[0]["display_name"], "coach");
    assert_eq!(body[0]["specialty"], "Tennis");
}

#[tokio::test]
async fn more_than_fifty_services_are_refused_not_truncated() {
    let backend = FakeBackend::default();
    let (_, token) = backend.user("coach@example.com", Some("INSTRUCTOR"));
    let app = app(&backend);

    let rows: Vec<(String, String)> = (0..51)
        .flat_map(|i| {
            [
                (format!("services[{i}].service_name"), format!("Lesson {i}")),
                (format!("services[{i}].duration_minutes"), "60".to_string()),
                (format!("services[{i}].price"), "80".to_string()),
            ]
        })
        .collect();
    let mut fields: Vec<(&str, &str)> = tennis_coach()
        .into_iter()
        .filter(|(k, _)| !k.starts_with("services"))
        .collect();
    fields.push(("services_count", "51"));
    fields.extend(rows.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let response = send(&app, post_form("/instructors", Some(&token), &fields)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(response).await;
    assert!(html.contains("Too many services (max 50)."));
    assert!(html.contains("value=\"Lesson 50\""));
    assert_eq!(backend.world.lock().instructor_attempts, 0);
}

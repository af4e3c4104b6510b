//! HTTP-level tests: routing, status codes and error bodies.
//!
//! Run with: cargo test --test http_integration

mod common;

use axum::http::{Method, StatusCode};
use common::{
    get_request, json_request, parse_response_body, student_json, submission_json,
    unique_guardian_email, TestContext,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new().await;
    let app = ctx.router();

    let response = app.clone().oneshot(get_request("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"]["backend"], "memory");

    let response = app.clone().oneshot(get_request("/api/health/live")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request("/api/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_onboarding_over_http() {
    let ctx = TestContext::new().await;
    ctx.course_invitation("CU25-HTTP01", 1).await;
    let app = ctx.router();

    let response = app
        .clone()
        .oneshot(get_request("/api/v1/invitations/CU25-HTTP01"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = parse_response_body(response).await;
    assert_eq!(view["remaining_uses"], 1);
    assert_eq!(view["kind"], "COURSE");
    assert_eq!(view["course"]["id"], ctx.course.id.to_string());

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/registration-requests",
            submission_json(
                "CU25-HTTP01",
                &unique_guardian_email(),
                vec![student_json("Luis", "Perez", ctx.course.id)],
            ),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let request = parse_response_body(response).await;
    assert_eq!(request["state"], "PENDING");
    let request_id = request["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/api/v1/admin/registration-requests/pending?school_id={}",
            ctx.school_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = parse_response_body(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], request_id.as_str());

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/admin/registration-requests/{}/approve", request_id),
            json!({ "reviewer_id": ctx.admin_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = parse_response_body(response).await;
    assert_eq!(result["created_account_ids"].as_array().unwrap().len(), 2);
    assert_eq!(result["invitation"]["state"], "CONSUMED");

    let response = app
        .clone()
        .oneshot(get_request(&format!(
            "/api/v1/admin/registration-requests/{}",
            request_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_response_body(response).await["state"], "APPROVED");

    // Exhausted invitations answer 409.
    let response = app
        .oneshot(get_request("/api/v1/invitations/CU25-HTTP01"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "conflict");
    assert_eq!(body["message"], "exhausted");
}

#[tokio::test]
async fn test_submission_validation_errors() {
    let ctx = TestContext::new().await;
    ctx.course_invitation("CU25-HTTP02", 1).await;
    let app = ctx.router();

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/registration-requests",
            submission_json("CU25-HTTP02", &unique_guardian_email(), vec![]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "students");

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/registration-requests",
            submission_json(
                "CU25-HTTP02",
                &unique_guardian_email(),
                vec![json!({ "name": "Luis", "last_name": "Perez", "course_id": "bogus" })],
            ),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = parse_response_body(response).await;
    assert_eq!(body["details"][0]["field"], "students[0].course_id");
    assert_eq!(body["details"][0]["message"], "Malformed identifier");

    let response = app
        .oneshot(get_request("/api/v1/invitations/CU25-ZZZZZZ"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_invitation_endpoints() {
    let ctx = TestContext::new().await;
    let app = ctx.router();

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/admin/invitations",
            json!({
                "kind": "COURSE",
                "school_id": ctx.school_id,
                "course_id": ctx.course.id,
                "creator_id": ctx.admin_id,
                "max_uses": 2
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let invitation = parse_response_body(response).await;
    assert_eq!(invitation["state"], "ACTIVE");
    assert_eq!(invitation["max_uses"], 2);
    let invitation_id = invitation["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/admin/invitations",
            json!({
                "kind": "COURSE",
                "school_id": ctx.school_id,
                "course_id": ctx.course.id,
                "creator_id": ctx.admin_id,
                "max_uses": 0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let revoke_uri = format!("/api/v1/admin/invitations/{}/revoke", invitation_id);
    let response = app
        .clone()
        .oneshot(json_request(Method::POST, &revoke_uri, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, &revoke_uri, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(parse_response_body(response).await["error"], "invalid_state");

    let response = app
        .clone()
        .oneshot(get_request("/api/v1/admin/invitations?school_id=garbage&state=REVOKED"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_response_body(response).await["total"], 1);

    let response = app
        .oneshot(get_request("/api/v1/admin/invitations?state=ARCHIVED"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reject_endpoint_requires_reason() {
    let ctx = TestContext::new().await;
    ctx.course_invitation("CU25-HTTP03", 1).await;
    let request = ctx
        .service
        .submit(common::submission(
            "CU25-HTTP03",
            &unique_guardian_email(),
            vec![student_json("Luis", "Perez", ctx.course.id)],
        ))
        .await
        .unwrap();
    let app = ctx.router();
    let uri = format!("/api/v1/admin/registration-requests/{}/reject", request.id);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &uri,
            json!({ "reviewer_id": ctx.admin_id, "reason": "  " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            &uri,
            json!({ "reviewer_id": ctx.admin_id, "reason": "Course is full" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_response_body(response).await;
    assert_eq!(body["state"], "REJECTED");
    assert_eq!(body["comments"], "Course is full");

    let response = app
        .clone()
        .oneshot(get_request(
            "/api/v1/admin/registration-requests?state=rejected&school_id=not-a-uuid",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_response_body(response).await["total"], 1);

    let response = app
        .oneshot(get_request(&format!(
            "/api/v1/admin/registration-requests/{}",
            Uuid::new_v4()
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

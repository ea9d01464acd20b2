mod support;

use axum::http::{header, StatusCode};
use chrono::{DateTime, Utc};
use serde_json::json;
use support::{body_json, get, json_request, with_header, TestApp, ALICE, ALICE_PASSWORD};
use uuid::Uuid;

async fn sign_in(app: &TestApp) -> String {
    let resp = app
        .send(json_request(
            "POST",
            "/signin",
            &json!({ "username": ALICE, "password": ALICE_PASSWORD }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    body["token"].as_str().expect("token").to_string()
}

fn authed(req: axum::http::Request<axum::body::Body>, token: &str) -> axum::http::Request<axum::body::Body> {
    with_header(req, header::AUTHORIZATION, &format!("Bearer {token}"))
}

#[tokio::test]
async fn sign_in_issues_ten_minute_token() {
    let app = TestApp::jwt();
    let before = Utc::now();
    let resp = app
        .send(json_request(
            "POST",
            "/signin",
            &json!({ "username": ALICE, "password": ALICE_PASSWORD }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;

    let expires: DateTime<Utc> = body["expires"].as_str().unwrap().parse().unwrap();
    let lifetime = (expires - before).num_seconds();
    assert!((599..=601).contains(&lifetime), "lifetime was {lifetime}");
    let claims = app.issuer.validate(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.username, ALICE);
}

#[tokio::test]
async fn wrong_password_yields_no_token() {
    let app = TestApp::jwt();
    let resp = app
        .send(json_request(
            "POST",
            "/signin",
            &json!({ "username": ALICE, "password": "looking-glass" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()["X-Error-Code"], "invalid_credentials");
    let body = body_json(resp).await;
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn gate_rejects_before_handler_runs() {
    let app = TestApp::jwt();
    let recipe = json!({ "name": "Soup", "tags": ["dinner"] });

    let resp = app.send(json_request("POST", "/recipes", &recipe)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .send(authed(json_request("POST", "/recipes", &recipe), "garbage"))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let now = Utc::now().timestamp();
    let expired = app.issuer.issue_with_expiry(ALICE, now - 700, now - 100).unwrap();
    let resp = app
        .send(authed(json_request("POST", "/recipes", &recipe), &expired.token))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()["X-Error-Code"], "token_expired");

    assert_eq!(app.cache.delete_count(), 0);
    let listed = body_json(app.send(get("/recipes")).await).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn crud_and_search_through_http() {
    let app = TestApp::jwt();
    let token = sign_in(&app).await;

    let resp = app
        .send(authed(
            json_request(
                "POST",
                "/recipes",
                &json!({
                    "name": "Soup",
                    "ingredients": ["water", "leek"],
                    "instructions": ["chop", "simmer"],
                    "tags": ["dinner"]
                }),
            ),
            &token,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let created = body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert!(created.get("publishedAt").is_some());

    let listed = body_json(app.send(get("/recipes")).await).await;
    assert_eq!(listed, json!([created.clone()]));

    let found = body_json(app.send(get("/recipes/search?tag=DINNER")).await).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    let none = body_json(app.send(get("/recipes/search?tag=lunch")).await).await;
    assert_eq!(none, json!([]));
    let resp = app.send(get("/recipes/search")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .send(authed(
            json_request(
                "PUT",
                &format!("/recipes/{id}"),
                &json!({ "name": "Leek soup", "tags": ["dinner", "vegan"] }),
            ),
            &token,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = body_json(resp).await;
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["publishedAt"], created["publishedAt"]);

    let listed = body_json(app.send(get("/recipes")).await).await;
    assert_eq!(listed[0]["name"], "Leek soup");

    let resp = app
        .send(authed(
            json_request("DELETE", &format!("/recipes/{id}"), &json!({})),
            &token,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({ "message": "Recipe has been deleted" })
    );

    let listed = body_json(app.send(get("/recipes")).await).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn bad_ids_and_missing_recipes() {
    let app = TestApp::jwt();
    let token = sign_in(&app).await;

    let resp = app
        .send(authed(
            json_request("PUT", "/recipes/not-a-uuid", &json!({ "name": "x" })),
            &token,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()["X-Error-Code"], "invalid_recipe_id");

    let deletes_before = app.cache.delete_count();
    let resp = app
        .send(authed(
            json_request("DELETE", &format!("/recipes/{}", Uuid::new_v4()), &json!({})),
            &token,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers()["X-Error-Code"], "recipe_not_found");
    assert_eq!(app.cache.delete_count(), deletes_before);

    let resp = app
        .send(authed(
            json_request("POST", "/recipes", &json!({ "name": "  " })),
            &token,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()["X-Error-Code"], "invalid_recipe");
}

#[tokio::test]
async fn cache_outage_is_a_server_error_without_store_query() {
    let app = TestApp::jwt();
    app.cache.set_unavailable(true);

    let resp = app.send(get("/recipes")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers()["X-Error-Code"], "internal_error");
    assert_eq!(app.store.find_all_count(), 0);
}

#[tokio::test]
async fn refresh_respects_window() {
    let app = TestApp::jwt();
    let token = sign_in(&app).await;

    let resp = app
        .send(authed(json_request("POST", "/refresh", &json!({})), &token))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers()["X-Error-Code"], "token_not_expired");

    let now = Utc::now().timestamp();
    let near_expiry = app.issuer.issue_with_expiry(ALICE, now - 590, now + 10).unwrap();
    let resp = app
        .send(authed(
            json_request("POST", "/refresh", &json!({})),
            &near_expiry.token,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let expires: DateTime<Utc> = body["expires"].as_str().unwrap().parse().unwrap();
    assert!(expires > near_expiry.expires_at);

    let resp = app.send(json_request("POST", "/refresh", &json!({}))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_metrics_are_open() {
    let app = TestApp::jwt();
    assert_eq!(app.send(get("/healthz")).await.status(), StatusCode::OK);
    app.send(get("/recipes")).await;
    app.send(get("/recipes")).await;

    let resp = app.send(get("/metrics")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(app.metrics.cache_hits(), 1);
    assert_eq!(app.metrics.cache_misses(), 1);
}

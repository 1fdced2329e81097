use actix_web::{test, web, App};
use chrono::DateTime;
use kotipolku_server::{api, AppState, Settings};
use sqlx::postgres::PgPoolOptions;

fn lazy_state() -> AppState {
    let config = Settings::new_for_test().expect("Failed to load test config");
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .expect("Failed to create lazy pool");
    AppState::with_pool(config, pool).expect("Failed to build state")
}

#[actix_web::test]
async fn test_health_check() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(lazy_state()))
            .configure(api::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let json: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(json["status"], "healthy");
    assert!(DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
}

#[actix_web::test]
async fn test_unknown_route_is_404() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(lazy_state()))
            .configure(api::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/nothing-here").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

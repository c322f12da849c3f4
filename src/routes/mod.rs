use std::sync::Arc;

use axum::{routing::get, Router};

use crate::AppState;

pub mod activities;
pub mod auth;
pub mod bookings;
pub mod calendar;
pub mod health;
pub mod shares;

/// Every route of the service with state attached; middleware is layered on by the caller.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Merged viewer calendar
        .nest("/api/calendar", calendar::router())
        // Activities and their schedules
        .nest("/api/activities", activities::router())
        .nest("/api/bookings", bookings::router())
        // Calendar sharing between users
        .nest("/api/shares", shares::router())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::test_pool;
    use crate::routes::auth::issue_test_token;
    use crate::AppState;

    pub const SECRET: &str = "test-secret";

    pub async fn state() -> Arc<AppState> {
        let mut config = Config::default();
        config.jwt.secret = SECRET.to_string();
        Arc::new(AppState::new(test_pool().await, config))
    }

    pub fn token(user_id: &str) -> String {
        issue_test_token(SECRET, user_id, &format!("User {}", user_id))
    }

    /// Send one request through a fresh router and decode the JSON body.
    pub async fn send(
        state: &Arc<AppState>,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("authorization", format!("Bearer {}", token(user)));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = super::app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

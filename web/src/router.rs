use crate::{
    controller::{
        attachment_controller, block_controller, health_check_controller, message_controller,
        relationship_controller, user_controller,
    },
    middleware::admission::admission_control,
    params,
    sse::handler::sse_handler,
    AppState,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::services::ServeDir;

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Parley API"
        ),
        paths(
            health_check_controller::health_check,
            relationship_controller::create,
            relationship_controller::index,
            relationship_controller::respond,
            relationship_controller::read,
            relationship_controller::delete,
            block_controller::create,
            block_controller::delete,
            message_controller::create,
            message_controller::unread,
            message_controller::read,
            message_controller::history,
            message_controller::mark_read,
            attachment_controller::create,
            user_controller::presence,
            user_controller::delete_me,
        ),
        components(
            schemas(
                domain::relationships::Model,
                domain::messages::Model,
                domain::messages::Attachment,
                domain::users::Model,
                params::relationship::SendRequestParams,
                params::relationship::RespondParams,
                params::block::BlockParams,
                params::message::SendParams,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "parley", description = "Relationship-gated realtime messaging API")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Every endpoint except /health expects a signed bearer token.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("HS256 token whose `sub` claim is the user id"))
                        .build(),
                ),
            )
        }
    }
}

/// All routes, wrapped in admission control as the outermost layer.
pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(sse_routes(app_state.clone()))
        .merge(relationship_routes(app_state.clone()))
        .merge(block_routes(app_state.clone()))
        .merge(message_routes(app_state.clone()))
        .merge(attachment_routes(app_state.clone()))
        .merge(user_routes(app_state.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
        .merge(upload_routes(&app_state))
        .layer(from_fn_with_state(app_state, admission_control))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn sse_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/sse", get(sse_handler))
        .with_state(app_state)
}

fn relationship_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/relationships", post(relationship_controller::create))
        .route("/relationships", get(relationship_controller::index))
        .route(
            "/relationships/{id}/response",
            put(relationship_controller::respond),
        )
        .route(
            "/relationships/with/{other_id}",
            get(relationship_controller::read),
        )
        .route(
            "/relationships/with/{other_id}",
            delete(relationship_controller::delete),
        )
        .with_state(app_state)
}

fn block_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/blocks", post(block_controller::create))
        .route("/blocks/{target_id}", delete(block_controller::delete))
        .with_state(app_state)
}

fn message_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/messages", post(message_controller::create))
        .route("/messages/unread", get(message_controller::unread))
        .route("/messages/{id}", get(message_controller::read))
        .route(
            "/messages/with/{counterpart_id}",
            get(message_controller::history),
        )
        .route(
            "/messages/with/{counterpart_id}/read",
            put(message_controller::mark_read),
        )
        .with_state(app_state)
}

fn attachment_routes(app_state: AppState) -> Router {
    let body_limit = usize::try_from(app_state.config().max_attachment_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route("/attachments", post(attachment_controller::create))
        // Oversized bodies are cut off here; the domain check reports the limit
        .layer(DefaultBodyLimit::max(body_limit.saturating_add(1)))
        .with_state(app_state)
}

fn user_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/users/me", delete(user_controller::delete_me))
        .route("/users/{id}/presence", get(user_controller::presence))
        .with_state(app_state)
}

/// Stored attachments, served read-only from the blob store's directory.
fn upload_routes(app_state: &AppState) -> Router {
    let config = app_state.config();
    Router::new().nest_service(&config.uploads_base_url, ServeDir::new(&config.uploads_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        app_state, app_state_with, body_json, body_text, request, test_config, token_for,
    };
    use axum::body::Body;
    use axum::http::{header::RETRY_AFTER, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Client {
        router: Router,
    }

    impl Client {
        async fn call(
            &self,
            method: &str,
            uri: &str,
            token: &str,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let response = self
                .router
                .clone()
                .oneshot(request(method, uri, Some(token), body))
                .await
                .unwrap();
            let status = response.status();
            (status, body_json(response).await)
        }
    }

    #[tokio::test]
    async fn health_needs_neither_token_nor_version() {
        let router = define_routes(app_state().await);

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "healthy");
    }

    #[tokio::test]
    async fn protected_routes_reject_missing_or_bad_tokens() {
        let router = define_routes(app_state().await);

        let anonymous = router
            .clone()
            .oneshot(request("GET", "/relationships", None, None))
            .await
            .unwrap();
        let forged = router
            .oneshot(request("GET", "/relationships", Some("not-a-token"), None))
            .await
            .unwrap();

        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_version_header_is_bad_request() {
        let app_state = app_state().await;
        let token = token_for(&app_state, "alice");
        let router = define_routes(app_state);

        let response = router
            .oneshot(
                Request::get("/relationships")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admission_applies_before_routing() {
        let mut config = test_config();
        config.permit_limit = 2;
        let router = define_routes(app_state_with(config).await);

        let health = || Request::get("/health").body(Body::empty()).unwrap();
        assert_eq!(router.clone().oneshot(health()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(router.clone().oneshot(health()).await.unwrap().status(), StatusCode::OK);

        let limited = router.oneshot(health()).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.headers().contains_key(RETRY_AFTER));
        assert_eq!(body_text(limited).await, "TOO MANY REQUESTS");
    }

    #[tokio::test]
    async fn friendship_messaging_and_blocking_flow() {
        let app_state = app_state().await;
        let alice = token_for(&app_state, "alice");
        let bob = token_for(&app_state, "bob");
        let carol = token_for(&app_state, "carol");
        let client = Client {
            router: define_routes(app_state),
        };

        // Strangers cannot message each other
        let (status, _) = client
            .call("POST", "/messages", &alice, Some(json!({"receiver_id": "bob", "content": "hi"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = client
            .call("POST", "/relationships", &alice, Some(json!({"recipient_id": "bob"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status_code"], 201);
        assert_eq!(body["data"]["status"], "pending");
        let relationship_id = body["data"]["id"].as_str().unwrap().to_string();

        // Only the recipient can answer
        let (status, _) = client
            .call(
                "PUT",
                &format!("/relationships/{relationship_id}/response"),
                &alice,
                Some(json!({"accept": true})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = client
            .call(
                "PUT",
                &format!("/relationships/{relationship_id}/response"),
                &bob,
                Some(json!({"accept": true})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "accepted");

        let (status, body) = client
            .call("POST", "/messages", &alice, Some(json!({"receiver_id": "bob", "content": "hi"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["content"], "hi");
        let message_id = body["data"]["id"].as_str().unwrap().to_string();

        // Either party can fetch the message by id, nobody else can
        let (status, body) = client
            .call("GET", &format!("/messages/{message_id}"), &bob, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["sender_id"], "alice");
        let (status, _) = client
            .call("GET", &format!("/messages/{message_id}"), &carol, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = client.call("GET", "/messages/unread", &bob, None).await;
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["by_sender"]["alice"], 1);

        let (_, body) = client.call("GET", "/messages/with/alice", &bob, None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (_, body) = client
            .call("PUT", "/messages/with/alice/read", &bob, None)
            .await;
        assert_eq!(body["data"]["unread_count"], 0);

        let (status, _) = client
            .call("POST", "/blocks", &alice, Some(json!({"target_id": "bob"})))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = client
            .call("GET", "/relationships/with/alice", &bob, None)
            .await;
        assert_eq!(body["data"]["status"], "blocked");
        assert_eq!(body["data"]["blocked_by_me"], false);
        assert_eq!(body["data"]["blocked_by_them"], true);

        // Neither direction gets through while blocked
        let (status, _) = client
            .call("POST", "/messages", &bob, Some(json!({"receiver_id": "alice", "content": "?"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = client
            .call("POST", "/messages", &alice, Some(json!({"receiver_id": "bob", "content": "?"})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Only the blocker can lift it
        let (status, _) = client.call("DELETE", "/blocks/alice", &bob, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = client.call("DELETE", "/blocks/bob", &alice, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = client.call("DELETE", "/blocks/bob", &alice, None).await;
        assert_ne!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn presence_is_only_visible_to_friends() {
        let app_state = app_state().await;
        let alice = token_for(&app_state, "alice");
        let bob = token_for(&app_state, "bob");
        let carol = token_for(&app_state, "carol");
        let client = Client {
            router: define_routes(app_state),
        };

        let (_, body) = client
            .call("POST", "/relationships", &alice, Some(json!({"recipient_id": "bob"})))
            .await;
        let relationship_id = body["data"]["id"].as_str().unwrap().to_string();
        client
            .call(
                "PUT",
                &format!("/relationships/{relationship_id}/response"),
                &bob,
                Some(json!({"accept": true})),
            )
            .await;

        let (status, body) = client.call("GET", "/users/alice/presence", &bob, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_online"], false);

        let (status, _) = client.call("GET", "/users/alice/presence", &carol, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = client.call("GET", "/users/alice/presence", &alice, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn uploaded_attachment_is_served_back() {
        let app_state = app_state().await;
        let alice = token_for(&app_state, "alice");
        let router = define_routes(app_state);

        let upload = Request::post("/attachments?name=photo.png")
            .header("x-version", service::config::ApiVersion::default_version())
            .header("authorization", format!("Bearer {alice}"))
            .body(Body::from(vec![0x89, b'P', b'N', b'G']))
            .unwrap();
        let response = router.clone().oneshot(upload).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["data"]["message_type"], "image");
        assert_eq!(body["data"]["size_bytes"], 4);
        let url = body["data"]["url"].as_str().unwrap().to_string();

        let served = router
            .oneshot(Request::get(url.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(served.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn deleting_an_account_revokes_its_tokens() {
        let app_state = app_state().await;
        let dave = token_for(&app_state, "dave");
        let client = Client {
            router: define_routes(app_state),
        };

        let (status, body) = client.call("DELETE", "/users/me", &dave, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["messages_deleted"], 0);

        let (status, _) = client.call("GET", "/relationships", &dave, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

use crate::extractors::authenticated_user::AuthenticatedUser;
use crate::AppState;
use ::sse::connection::ConnectionId;
use async_stream::stream;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use domain::{presence, relationship, UserId};
use futures::Stream;
use log::*;
use std::convert::Infallible;
use tokio::sync::mpsc;

/// Long-lived event stream for the caller. A user may hold several at once;
/// presence only changes on the first connect and after the last disconnect.
pub(crate) async fn sse_handler(
    AuthenticatedUser(user_id): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Establishing SSE connection for user {user_id}");

    if let Err(e) = relationship::ensure_assistant_relationship(app_state.db_conn_ref(), &user_id).await {
        warn!("Could not ensure assistant relationship for {user_id}: {e:?}");
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let registration = app_state
        .sse_manager
        .register_connection(user_id.clone(), tx);

    // Nothing may be awaited between registering and building the guard
    let guard = ConnectionGuard {
        app_state: app_state.clone(),
        connection_id: registration.connection_id,
        user_id: user_id.clone(),
    };

    if registration.came_online {
        announce_transition(&app_state, &user_id, true).await;
    }

    let stream = stream! {
        // Dropped with the stream when the client goes away
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            yield Ok(Event::from(frame));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Unregisters its connection when dropped. Dropping the last connection of a
/// user schedules the offline transition after the presence grace period.
struct ConnectionGuard {
    app_state: AppState,
    connection_id: ConnectionId,
    user_id: UserId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!("SSE connection closed for user {}", self.user_id);

        let Some(user_id) = self
            .app_state
            .sse_manager
            .unregister_connection(&self.connection_id)
        else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime to settle presence for {user_id}");
            self.app_state.sse_manager.settle_offline(&user_id);
            return;
        };

        let app_state = self.app_state.clone();
        let grace_period = app_state.config().presence_grace_period();

        runtime.spawn(async move {
            if !grace_period.is_zero() {
                tokio::time::sleep(grace_period).await;
            }

            // A reconnect during the grace period cancels the transition
            if app_state.sse_manager.settle_offline(&user_id) {
                announce_transition(&app_state, &user_id, false).await;
            }
        });
    }
}

/// Announces a presence transition unless the registry has already moved on,
/// e.g. the user reconnected while its offline announcement was in flight.
async fn announce_transition(app_state: &AppState, user_id: &str, is_online: bool) {
    let sse_manager = &app_state.sse_manager;

    if let Err(e) = presence::announce_if(
        app_state.db_conn_ref(),
        &app_state.event_publisher,
        user_id,
        is_online,
        || sse_manager.is_online(user_id) == is_online,
    )
    .await
    {
        warn!(
            "Failed to announce {user_id} {}: {e:?}",
            if is_online { "online" } else { "offline" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{app_state, app_state_with, test_config};
    use ::sse::message::Frame;
    use std::task::Poll;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn befriend(app_state: &AppState, a: &str, b: &str) {
        let request = relationship::send_request(
            app_state.db_conn_ref(),
            &app_state.event_publisher,
            a,
            b,
        )
        .await
        .unwrap();
        relationship::respond(
            app_state.db_conn_ref(),
            &app_state.event_publisher,
            request.id,
            b,
            true,
        )
        .await
        .unwrap();
    }

    fn listen(app_state: &AppState, user_id: &str) -> UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        app_state
            .sse_manager
            .register_connection(user_id.to_string(), tx);
        rx
    }

    fn presence_frames(rx: &mut UnboundedReceiver<Frame>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if frame.event_type == "presence_updated" {
                frames.push(frame.data);
            }
        }
        frames
    }

    async fn wait_until_offline(app_state: &AppState, user_id: &str) {
        for _ in 0..100 {
            if !app_state.sse_manager.is_online(user_id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{user_id} never went offline");
    }

    #[tokio::test]
    async fn connecting_announces_online_and_dropping_announces_offline() {
        let app_state = app_state().await;
        befriend(&app_state, "alice", "bob").await;
        let mut bob = listen(&app_state, "bob");

        let sse = sse_handler(AuthenticatedUser("alice".to_string()), State(app_state.clone())).await;
        assert!(app_state.sse_manager.is_online("alice"));

        let online = presence_frames(&mut bob);
        assert_eq!(online.len(), 1);
        assert!(online[0].contains("\"is_online\":true"));

        drop(sse);
        wait_until_offline(&app_state, "alice").await;
        // Announce runs right after the transition settles
        tokio::time::sleep(Duration::from_millis(50)).await;

        let offline = presence_frames(&mut bob);
        assert_eq!(offline.len(), 1);
        assert!(offline[0].contains("\"is_online\":false"));
    }

    #[tokio::test]
    async fn second_connection_does_not_reannounce() {
        let app_state = app_state().await;
        befriend(&app_state, "alice", "bob").await;
        let mut bob = listen(&app_state, "bob");

        let first = sse_handler(AuthenticatedUser("alice".to_string()), State(app_state.clone())).await;
        let second = sse_handler(AuthenticatedUser("alice".to_string()), State(app_state.clone())).await;
        assert_eq!(presence_frames(&mut bob).len(), 1);

        drop(first);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(app_state.sse_manager.is_online("alice"));
        assert!(presence_frames(&mut bob).is_empty());

        drop(second);
        wait_until_offline(&app_state, "alice").await;
    }

    #[tokio::test]
    async fn reconnect_within_grace_period_keeps_user_online() {
        let mut config = test_config();
        config.presence_grace_period_ms = 200;
        let app_state = app_state_with(config).await;
        befriend(&app_state, "alice", "bob").await;
        let mut bob = listen(&app_state, "bob");

        let first = sse_handler(AuthenticatedUser("alice".to_string()), State(app_state.clone())).await;
        drop(first);
        let _second = sse_handler(AuthenticatedUser("alice".to_string()), State(app_state.clone())).await;

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(app_state.sse_manager.is_online("alice"));
        // Only the initial online announcement, no offline/online flap
        assert_eq!(presence_frames(&mut bob).len(), 1);
    }

    #[tokio::test]
    async fn abandoned_handshake_does_not_leave_the_user_online() {
        let app_state = app_state().await;
        befriend(&app_state, "alice", "bob").await;
        let _bob = listen(&app_state, "bob");

        let mut handshake = Box::pin(sse_handler(
            AuthenticatedUser("alice".to_string()),
            State(app_state.clone()),
        ));
        let mut completed = None;
        while !app_state.sse_manager.is_online("alice") {
            if let Poll::Ready(sse) = futures::poll!(&mut handshake) {
                completed = Some(sse);
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(app_state.sse_manager.is_online("alice"));

        // The client goes away before the stream is ever handed out
        drop(completed);
        drop(handshake);

        wait_until_offline(&app_state, "alice").await;
    }

    #[tokio::test]
    async fn offline_announcement_is_dropped_after_a_reconnect() {
        let app_state = app_state().await;
        befriend(&app_state, "alice", "bob").await;
        let mut bob = listen(&app_state, "bob");

        let (tx, _rx) = mpsc::unbounded_channel();
        let first = app_state
            .sse_manager
            .register_connection("alice".to_string(), tx);
        app_state
            .sse_manager
            .unregister_connection(&first.connection_id);
        assert!(app_state.sse_manager.settle_offline("alice"));

        // Reconnects before the settled offline transition is announced
        let (tx, _rx_again) = mpsc::unbounded_channel();
        let again = app_state
            .sse_manager
            .register_connection("alice".to_string(), tx);
        assert!(again.came_online);
        announce_transition(&app_state, "alice", true).await;

        announce_transition(&app_state, "alice", false).await;

        let frames = presence_frames(&mut bob);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("\"is_online\":true"));
    }

    #[tokio::test]
    async fn connecting_creates_the_assistant_friendship() {
        let app_state = app_state().await;

        let _sse = sse_handler(AuthenticatedUser("carol".to_string()), State(app_state.clone())).await;

        let status = relationship::query(
            app_state.db_conn_ref(),
            "carol",
            domain::users::ASSISTANT_ID,
        )
        .await
        .unwrap();
        assert_eq!(status, Some(domain::relationship_status::RelationshipStatus::Accepted));
    }
}

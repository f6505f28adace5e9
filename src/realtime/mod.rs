use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::auth::Identity;
use crate::leads::Lead;
use crate::shared::state::AppState;

pub const CHANGE_FEED_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change on the leads table, published by the repository after the
/// mutation commits. `new` carries the row for inserts and updates, `old`
/// the pre-image for deletes.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeEvent {
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    pub new: Option<Lead>,
    pub old: Option<Lead>,
}

impl ChangeEvent {
    pub fn insert(lead: Lead) -> Self {
        Self {
            kind: ChangeKind::Insert,
            new: Some(lead),
            old: None,
        }
    }

    pub fn update(lead: Lead) -> Self {
        Self {
            kind: ChangeKind::Update,
            new: Some(lead),
            old: None,
        }
    }

    pub fn delete(lead: Lead) -> Self {
        Self {
            kind: ChangeKind::Delete,
            new: None,
            old: Some(lead),
        }
    }

    fn lead(&self) -> Option<&Lead> {
        self.new.as_ref().or(self.old.as_ref())
    }
}

/// Transient notification shown on the dashboard for a relevant change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadNotification {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub lead_name: String,
    pub message: String,
    pub timestamp: String,
}

/// Map a change event to at most one notification for the given identity.
///
/// An event is relevant when the row is owned by or assigned to the identity;
/// everything else is dropped silently. There is deliberately no dedupe: a
/// change caused by the user's own action in the same session still notifies,
/// independent of whatever reload that action triggered.
pub fn notification_for(event: &ChangeEvent, user: &Identity) -> Option<LeadNotification> {
    let lead = event.lead()?;

    let relevant = lead.created_by == user.id || lead.assigned_to == Some(user.id);
    if !relevant {
        return None;
    }

    let message = match event.kind {
        ChangeKind::Insert => {
            format!("New lead \"{}\" has been added successfully!", lead.full_name)
        }
        ChangeKind::Update => {
            format!("Lead \"{}\" has been updated successfully!", lead.full_name)
        }
        ChangeKind::Delete => {
            format!("Lead \"{}\" has been deleted successfully!", lead.full_name)
        }
    };

    Some(LeadNotification {
        kind: event.kind,
        lead_name: lead.full_name.clone(),
        message,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// WebSocket endpoint for realtime lead notifications.
pub async fn realtime_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    user: Identity,
) -> impl IntoResponse {
    info!("realtime socket upgrade requested by {}", user.id);
    ws.on_upgrade(move |socket| handle_realtime_socket(socket, state, user))
}

async fn handle_realtime_socket(socket: WebSocket, state: Arc<AppState>, user: Identity) {
    let (mut sender, mut receiver) = socket.split();

    let welcome = serde_json::json!({
        "type": "connected",
        "user_id": user.id,
        "message": "Connected to lead notification service",
        "timestamp": Utc::now().to_rfc3339(),
    });
    if let Ok(text) = serde_json::to_string(&welcome) {
        if sender.send(Message::Text(text)).await.is_err() {
            error!("failed to send welcome message to {}", user.id);
            return;
        }
    }

    let mut feed = state.change_feed.subscribe();

    let send_user = user.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(event) => {
                    let Some(notification) = notification_for(&event, &send_user) else {
                        continue;
                    };
                    if let Ok(text) = serde_json::to_string(&notification) {
                        debug!(
                            "sending {:?} notification to {}",
                            notification.kind, send_user.id
                        );
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("realtime subscriber {} lagged by {n} events", send_user.id);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("change feed closed");
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("realtime socket closed for {}", user.id);
}

pub fn configure_realtime_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/realtime/ws", get(realtime_websocket_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::{sample_lead, test_identity};
    use uuid::Uuid;

    #[test]
    fn event_for_unrelated_row_produces_nothing() {
        let me = test_identity();
        let lead = sample_lead(Uuid::new_v4(), "Somebody Else");
        assert!(notification_for(&ChangeEvent::insert(lead), &me).is_none());
    }

    #[test]
    fn event_for_owned_row_produces_exactly_one_notification() {
        let me = test_identity();
        let lead = sample_lead(me.id, "Sarah Connor");
        let note = notification_for(&ChangeEvent::insert(lead), &me).unwrap();
        assert_eq!(note.kind, ChangeKind::Insert);
        assert_eq!(note.lead_name, "Sarah Connor");
        assert_eq!(
            note.message,
            "New lead \"Sarah Connor\" has been added successfully!"
        );
    }

    #[test]
    fn event_for_assigned_row_is_relevant() {
        let me = test_identity();
        let mut lead = sample_lead(Uuid::new_v4(), "Handed Over");
        lead.assigned_to = Some(me.id);
        let note = notification_for(&ChangeEvent::update(lead), &me).unwrap();
        assert_eq!(note.kind, ChangeKind::Update);
    }

    #[test]
    fn delete_event_uses_old_row() {
        let me = test_identity();
        let lead = sample_lead(me.id, "Going Away");
        let note = notification_for(&ChangeEvent::delete(lead), &me).unwrap();
        assert_eq!(note.kind, ChangeKind::Delete);
        assert_eq!(
            note.message,
            "Lead \"Going Away\" has been deleted successfully!"
        );
    }

    #[test]
    fn change_kind_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ChangeKind::Insert).unwrap(),
            "\"INSERT\""
        );
        assert_eq!(
            serde_json::to_string(&ChangeKind::Delete).unwrap(),
            "\"DELETE\""
        );
    }
}

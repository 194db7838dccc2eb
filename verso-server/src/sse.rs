use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use futures_util::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    convert::Infallible,
    pin::Pin,
    sync::atomic::{AtomicU64, Ordering},
    sync::{Arc, Weak},
    task::{Context, Poll, Waker},
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use verso_collab::{Collection, EventReceiver, VersoEvent};

use crate::{
    context::ServerContext,
    serialized::{Band, BandMember, Rehearsal, Setlist, Song, ToSerialized, User},
    Router,
};

type ConnectionId = u64;

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// A user completed a credential login
    UserLoggedIn { user: User },
    /// A session was ended by explicit sign-out
    SessionEnded { user_id: String },
    BandCreated { band: Band },
    /// A user became a member of a band
    MemberJoined {
        band_id: String,
        new_member: BandMember,
    },
    BandDeleted { band_id: String },
    /// A session moved to another workspace
    WorkspaceSwitched {
        user_id: String,
        workspace_id: String,
    },
    /// A song was saved. Delivered optimistically, ahead of the store.
    SongSaved { song: Song },
    SongDeleted { song_id: String },
    SetlistSaved { setlist: Setlist },
    SetlistDeleted { setlist_id: String },
    RehearsalSaved { rehearsal: Rehearsal },
    RehearsalDeleted { rehearsal_id: String },
    /// A winning option was selected for a rehearsal
    RehearsalConfirmed {
        rehearsal_id: String,
        option_id: String,
    },
    /// An optimistic write settled in the store
    WriteCommitted {
        collection: String,
        entity_id: String,
    },
    /// An optimistic write failed; clients should refresh the entity
    WriteFailed {
        collection: String,
        entity_id: String,
    },
}

fn collection_name(collection: Collection) -> String {
    let name = match collection {
        Collection::Songs => "songs",
        Collection::Setlists => "setlists",
        Collection::Rehearsals => "rehearsals",
        Collection::Bands => "bands",
    };

    name.to_string()
}

impl From<VersoEvent> for ServerEvent {
    fn from(value: VersoEvent) -> Self {
        match value {
            VersoEvent::UserLoggedIn { user } => Self::UserLoggedIn {
                user: user.to_serialized(),
            },
            VersoEvent::SessionEnded { user_id } => Self::SessionEnded { user_id },
            VersoEvent::BandCreated { band } => Self::BandCreated {
                band: band.to_serialized(),
            },
            VersoEvent::MemberJoined {
                band_id,
                new_member,
            } => Self::MemberJoined {
                band_id,
                new_member: new_member.to_serialized(),
            },
            VersoEvent::BandDeleted { band_id } => Self::BandDeleted { band_id },
            VersoEvent::WorkspaceSwitched {
                user_id,
                workspace_id,
            } => Self::WorkspaceSwitched {
                user_id,
                workspace_id,
            },
            VersoEvent::SongSaved { song, .. } => Self::SongSaved {
                song: song.to_serialized(),
            },
            VersoEvent::SongDeleted { song_id, .. } => Self::SongDeleted { song_id },
            VersoEvent::SetlistSaved { setlist, .. } => Self::SetlistSaved {
                setlist: setlist.to_serialized(),
            },
            VersoEvent::SetlistDeleted { setlist_id, .. } => Self::SetlistDeleted { setlist_id },
            VersoEvent::RehearsalSaved { rehearsal, .. } => Self::RehearsalSaved {
                rehearsal: rehearsal.to_serialized(),
            },
            VersoEvent::RehearsalDeleted { rehearsal_id, .. } => {
                Self::RehearsalDeleted { rehearsal_id }
            }
            VersoEvent::RehearsalConfirmed {
                rehearsal_id,
                option_id,
            } => Self::RehearsalConfirmed {
                rehearsal_id,
                option_id,
            },
            VersoEvent::WriteCommitted {
                collection,
                entity_id,
                ..
            } => Self::WriteCommitted {
                collection: collection_name(collection),
                entity_id,
            },
            VersoEvent::WriteFailed {
                collection,
                entity_id,
                ..
            } => Self::WriteFailed {
                collection: collection_name(collection),
                entity_id,
            },
        }
    }
}

/// Manages server sent event connections
pub struct ServerSentEvents {
    me: Weak<Self>,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    pending_messages: Arc<Mutex<Vec<ServerEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<Vec<ServerEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    manager: Weak<ServerSentEvents>,
}

impl ServerSentEvents {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    pub fn broadcast(&self, event: ServerEvent) {
        let connections = self.connections.lock();

        for connection in connections.iter() {
            connection.send(event.clone())
        }
    }

    fn connect(&self) -> ConnectionHandle {
        let connection = Connection::new();
        let handle = connection.handle(self.me.clone());

        self.connections.lock().push(connection);
        handle
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.lock().retain(|c| c.id != id)
    }
}

/// Bridges the collab system's event bus onto the SSE connections
pub fn forward_events(mut events: EventReceiver, sse: Arc<ServerSentEvents>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => sse.broadcast(event.into()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("Event stream lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
}

impl Connection {
    fn new() -> Self {
        Self {
            id: CONNECTION_COUNTER.fetch_add(1, Ordering::SeqCst),
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, message: ServerEvent) {
        self.pending_messages.lock().push(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, manager: Weak<ServerSentEvents>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            manager,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_messages = self.pending_messages.lock();

        let next_event = pending_messages
            .pop()
            .and_then(|m| serde_json::to_string(&m).ok());

        if let Some(event) = next_event {
            return Poll::Ready(Some(Ok(Event::default().data(event))));
        }

        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/events",
    tag = "events",
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events from this verso instance",
            body = ServerEvent
        )
    )
)]
pub(crate) async fn event_stream(State(context): State<ServerContext>) -> Sse<ConnectionHandle> {
    Sse::new(context.sse.connect()).keep_alive(KeepAlive::default())
}

pub fn router() -> Router {
    Router::new().route("/", get(event_stream))
}

use std::sync::{Arc, Weak};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

mod merge;
mod writes;

pub use merge::*;
pub use writes::*;

use crate::{
    ChangeEvent, Collection, RehearsalData, SessionTracker, SetlistData, SongData, StoreError,
    VersoContext, VersoEvent,
};

#[derive(Debug, Error)]
pub enum SyncError {
    /// The session is not provider-confirmed, so remote queries would be
    /// rejected by the store's access rules. Recover by re-authenticating.
    #[error("Session is not synced; remote queries would be rejected")]
    PermissionDenied,
    #[error("Workspace sync is not attached")]
    NotAttached,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        if value.is_permission_denied() {
            Self::PermissionDenied
        } else {
            Self::Store(value)
        }
    }
}

/// A per-stream failure, routed to the caller's fault handler
#[derive(Debug, Clone)]
pub enum SyncFault {
    /// Usually a session/workspace mismatch rather than a transient fault
    PermissionDenied { collection: Collection },
    /// The stream stopped delivering updates
    Stream {
        collection: Collection,
        message: String,
    },
}

pub type FaultHandler = Arc<dyn Fn(SyncFault) + Send + Sync>;

type QueryFn<T> = Box<dyn Fn() -> BoxFuture<'static, crate::store::Result<Vec<T>>> + Send + Sync>;

/// The live snapshot channels of an attached workspace
#[derive(Clone)]
pub struct SyncStreams {
    pub songs: watch::Receiver<Vec<SongData>>,
    pub setlists: watch::Receiver<Vec<SetlistData>>,
    pub rehearsals: watch::Receiver<Vec<RehearsalData>>,
}

struct ActiveSync {
    streams: SyncStreams,
    tasks: Vec<JoinHandle<()>>,
}

/// Live collection sync for a single workspace.
///
/// Establishes two predicate subscriptions per collection (legacy owner id
/// and workspace id), merges them by entity id with highest-revision-wins,
/// and publishes complete sorted snapshots on every store change. Local
/// mutations land optimistically through the event bus and roll back when
/// their writes fail.
///
/// Detaching is synchronous and every attach gets fresh channels, so a
/// subscription on a stale workspace can never deliver into the current
/// one's state.
pub struct WorkspaceSync {
    me: Weak<Self>,
    context: VersoContext,
    session: Arc<SessionTracker>,
    workspace_id: String,
    state: Mutex<Option<ActiveSync>>,
}

impl WorkspaceSync {
    pub fn new(
        context: &VersoContext,
        session: Arc<SessionTracker>,
        workspace_id: impl Into<String>,
    ) -> Arc<Self> {
        let workspace_id = workspace_id.into();

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            context: context.clone(),
            session,
            workspace_id,
            state: Mutex::new(None),
        })
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Establishes the six subscriptions and returns the snapshot streams.
    ///
    /// Requires a provider-confirmed session: a locally cached user alone
    /// must never issue remote queries.
    pub async fn attach(&self, on_fault: FaultHandler) -> Result<SyncStreams, SyncError> {
        if !self.session.is_synced() {
            return Err(SyncError::PermissionDenied);
        }

        self.detach();

        let store = &self.context.store;
        let ws = &self.workspace_id;

        let songs = {
            let (store, ws) = (store.clone(), ws.clone());
            let owner: QueryFn<SongData> = Box::new(move || {
                let (store, ws) = (store.clone(), ws.clone());
                async move { store.songs_by_owner(&ws).await }.boxed()
            });

            let (store, ws) = (self.context.store.clone(), self.workspace_id.clone());
            let workspace: QueryFn<SongData> = Box::new(move || {
                let (store, ws) = (store.clone(), ws.clone());
                async move { store.songs_by_workspace(&ws).await }.boxed()
            });

            self.setup_collection(Collection::Songs, owner, workspace, &on_fault)
                .await?
        };

        let setlists = {
            let (store, ws) = (self.context.store.clone(), self.workspace_id.clone());
            let owner: QueryFn<SetlistData> = Box::new(move || {
                let (store, ws) = (store.clone(), ws.clone());
                async move { store.setlists_by_owner(&ws).await }.boxed()
            });

            let (store, ws) = (self.context.store.clone(), self.workspace_id.clone());
            let workspace: QueryFn<SetlistData> = Box::new(move || {
                let (store, ws) = (store.clone(), ws.clone());
                async move { store.setlists_by_workspace(&ws).await }.boxed()
            });

            self.setup_collection(Collection::Setlists, owner, workspace, &on_fault)
                .await?
        };

        let rehearsals = {
            let (store, ws) = (self.context.store.clone(), self.workspace_id.clone());
            let owner: QueryFn<RehearsalData> = Box::new(move || {
                let (store, ws) = (store.clone(), ws.clone());
                async move { store.rehearsals_by_owner(&ws).await }.boxed()
            });

            let (store, ws) = (self.context.store.clone(), self.workspace_id.clone());
            let workspace: QueryFn<RehearsalData> = Box::new(move || {
                let (store, ws) = (store.clone(), ws.clone());
                async move { store.rehearsals_by_workspace(&ws).await }.boxed()
            });

            self.setup_collection(Collection::Rehearsals, owner, workspace, &on_fault)
                .await?
        };

        let (songs_rx, mut tasks, songs_merge, songs_tx) = songs;
        let (setlists_rx, setlist_tasks, setlists_merge, setlists_tx) = setlists;
        let (rehearsals_rx, rehearsal_tasks, rehearsals_merge, rehearsals_tx) = rehearsals;

        tasks.extend(setlist_tasks);
        tasks.extend(rehearsal_tasks);

        let senders = TaskSenders {
            songs: songs_tx,
            setlists: setlists_tx,
            rehearsals: rehearsals_tx,
        };

        tasks.push(self.spawn_optimistic_task(
            senders,
            songs_merge,
            setlists_merge,
            rehearsals_merge,
        ));
        tasks.push(self.spawn_phase_guard());

        let streams = SyncStreams {
            songs: songs_rx,
            setlists: setlists_rx,
            rehearsals: rehearsals_rx,
        };

        *self.state.lock() = Some(ActiveSync {
            streams: streams.clone(),
            tasks,
        });

        Ok(streams)
    }

    /// Synchronously detaches every subscription
    pub fn detach(&self) {
        if let Some(active) = self.state.lock().take() {
            for task in active.tasks {
                task.abort();
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().is_some()
    }

    pub fn streams(&self) -> Option<SyncStreams> {
        self.state.lock().as_ref().map(|a| a.streams.clone())
    }

    /// The current merged song snapshot, sorted by title
    pub fn songs(&self) -> Result<Vec<SongData>, SyncError> {
        self.streams()
            .ok_or(SyncError::NotAttached)
            .map(|s| s.songs.borrow().clone())
    }

    /// The current merged setlist snapshot, newest first
    pub fn setlists(&self) -> Result<Vec<SetlistData>, SyncError> {
        self.streams()
            .ok_or(SyncError::NotAttached)
            .map(|s| s.setlists.borrow().clone())
    }

    /// The current merged rehearsal snapshot, newest first
    pub fn rehearsals(&self) -> Result<Vec<RehearsalData>, SyncError> {
        self.streams()
            .ok_or(SyncError::NotAttached)
            .map(|s| s.rehearsals.borrow().clone())
    }

    async fn setup_collection<T>(
        &self,
        collection: Collection,
        owner_query: QueryFn<T>,
        workspace_query: QueryFn<T>,
        on_fault: &FaultHandler,
    ) -> Result<
        (
            watch::Receiver<Vec<T>>,
            Vec<JoinHandle<()>>,
            Arc<Mutex<DualQueryMerge<T>>>,
            Arc<watch::Sender<Vec<T>>>,
        ),
        SyncError,
    >
    where
        T: SyncEntity + Send + Sync + 'static,
    {
        let merge = Arc::new(Mutex::new(DualQueryMerge::new()));

        // Seed both predicates before any task runs, so the first snapshot
        // a consumer sees is already complete
        let initial_owner = owner_query().await?;
        let initial_workspace = workspace_query().await?;

        let snapshot = {
            let mut merge = merge.lock();
            merge.apply_snapshot(QueryPredicate::ByOwner, initial_owner);
            merge.apply_snapshot(QueryPredicate::ByWorkspace, initial_workspace)
        };

        let (tx, rx) = watch::channel(snapshot);
        let tx = Arc::new(tx);

        let tasks = vec![
            spawn_predicate_task(
                collection,
                QueryPredicate::ByOwner,
                owner_query,
                merge.clone(),
                tx.clone(),
                self.context.store.changes(),
                on_fault.clone(),
            ),
            spawn_predicate_task(
                collection,
                QueryPredicate::ByWorkspace,
                workspace_query,
                merge.clone(),
                tx.clone(),
                self.context.store.changes(),
                on_fault.clone(),
            ),
        ];

        Ok((rx, tasks, merge, tx))
    }

    /// Applies optimistic mutations from the event bus on top of the
    /// store-backed snapshots, and settles or rolls them back as their
    /// writes commit or fail.
    fn spawn_optimistic_task(
        &self,
        state: TaskSenders,
        songs: Arc<Mutex<DualQueryMerge<SongData>>>,
        setlists: Arc<Mutex<DualQueryMerge<SetlistData>>>,
        rehearsals: Arc<Mutex<DualQueryMerge<RehearsalData>>>,
    ) -> JoinHandle<()> {
        let mut events = self.context.subscribe();
        let workspace_id = self.workspace_id.clone();

        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return,
                };

                match event {
                    VersoEvent::SongSaved { song, .. } => {
                        let in_scope = song.owner_id.as_deref() == Some(&workspace_id)
                            || song.workspace_id.as_deref() == Some(&workspace_id);

                        if in_scope {
                            state.songs.send_replace(songs.lock().apply_local(song));
                        }
                    }
                    VersoEvent::SongDeleted { song_id, .. } => {
                        state
                            .songs
                            .send_replace(songs.lock().apply_local_delete(&song_id));
                    }
                    VersoEvent::SetlistSaved { setlist, .. } => {
                        let in_scope = setlist.owner_id == workspace_id
                            || setlist.workspace_id.as_deref() == Some(&workspace_id);

                        if in_scope {
                            state
                                .setlists
                                .send_replace(setlists.lock().apply_local(setlist));
                        }
                    }
                    VersoEvent::SetlistDeleted { setlist_id, .. } => {
                        state
                            .setlists
                            .send_replace(setlists.lock().apply_local_delete(&setlist_id));
                    }
                    VersoEvent::RehearsalSaved { rehearsal, .. } => {
                        let in_scope = rehearsal.created_by.as_deref() == Some(&workspace_id)
                            || rehearsal.workspace_id.as_deref() == Some(&workspace_id);

                        if in_scope {
                            state
                                .rehearsals
                                .send_replace(rehearsals.lock().apply_local(rehearsal));
                        }
                    }
                    VersoEvent::RehearsalDeleted { rehearsal_id, .. } => {
                        state
                            .rehearsals
                            .send_replace(rehearsals.lock().apply_local_delete(&rehearsal_id));
                    }
                    VersoEvent::WriteCommitted {
                        collection,
                        entity_id,
                        revision,
                        ..
                    } => match collection {
                        Collection::Songs => {
                            state
                                .songs
                                .send_replace(songs.lock().mark_committed(&entity_id, revision));
                        }
                        Collection::Setlists => {
                            state.setlists.send_replace(
                                setlists.lock().mark_committed(&entity_id, revision),
                            );
                        }
                        Collection::Rehearsals => {
                            state.rehearsals.send_replace(
                                rehearsals.lock().mark_committed(&entity_id, revision),
                            );
                        }
                        Collection::Bands => {}
                    },
                    VersoEvent::WriteFailed {
                        collection,
                        entity_id,
                        ..
                    } => match collection {
                        Collection::Songs => {
                            state.songs.send_replace(songs.lock().rollback(&entity_id));
                        }
                        Collection::Setlists => {
                            state
                                .setlists
                                .send_replace(setlists.lock().rollback(&entity_id));
                        }
                        Collection::Rehearsals => {
                            state
                                .rehearsals
                                .send_replace(rehearsals.lock().rollback(&entity_id));
                        }
                        Collection::Bands => {}
                    },
                    _ => {}
                }
            }
        })
    }

    /// Tears everything down if the session leaves the synced phase
    fn spawn_phase_guard(&self) -> JoinHandle<()> {
        let weak = self.me.clone();
        let mut phase = self.session.watch();

        tokio::spawn(async move {
            loop {
                if phase.changed().await.is_err() {
                    return;
                }

                let synced = matches!(*phase.borrow(), crate::SessionPhase::Synced);

                if !synced {
                    if let Some(sync) = weak.upgrade() {
                        sync.detach();
                    }

                    return;
                }
            }
        })
    }

}

/// The watch senders the optimistic task publishes into
struct TaskSenders {
    songs: Arc<watch::Sender<Vec<SongData>>>,
    setlists: Arc<watch::Sender<Vec<SetlistData>>>,
    rehearsals: Arc<watch::Sender<Vec<RehearsalData>>>,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{MemoryStore, SessionPhase, Store, UserData};
    use tokio::time::{sleep, timeout, Duration};

    fn user() -> UserData {
        UserData {
            id: "u1".to_string(),
            name: "Alex".to_string(),
            email: "alex@example.com".to_string(),
            picture: String::new(),
        }
    }

    fn song(id: &str, title: &str, owner: Option<&str>, workspace: Option<&str>) -> SongData {
        SongData {
            id: id.to_string(),
            title: title.to_string(),
            artist: String::new(),
            content: String::new(),
            key: None,
            owner_id: owner.map(Into::into),
            workspace_id: workspace.map(Into::into),
            revision: 0,
        }
    }

    fn quiet() -> FaultHandler {
        Arc::new(|_| {})
    }

    fn synced_sync(context: &VersoContext, workspace_id: &str) -> Arc<WorkspaceSync> {
        let tracker = Arc::new(SessionTracker::confirmed(user()));
        WorkspaceSync::new(context, tracker, workspace_id)
    }

    #[tokio::test]
    async fn test_attach_requires_synced_session() {
        let context = VersoContext::new(Arc::new(MemoryStore::new()));
        let tracker = Arc::new(SessionTracker::new());
        let sync = WorkspaceSync::new(&context, tracker, "u1");

        let result = sync.attach(quiet()).await;
        assert!(matches!(result, Err(SyncError::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_merges_legacy_and_workspace_tagged_entities() {
        let context = VersoContext::new(Arc::new(MemoryStore::new()));

        // A is tagged only via the legacy owner field, B only via workspace
        context
            .store
            .save_song(song("a", "Alive", Some("w1"), None))
            .await
            .unwrap();
        context
            .store
            .save_song(song("b", "Black", None, Some("w1")))
            .await
            .unwrap();
        context
            .store
            .save_song(song("c", "Creep", Some("other"), None))
            .await
            .unwrap();

        let sync = synced_sync(&context, "w1");
        sync.attach(quiet()).await.unwrap();

        let ids: Vec<_> = sync
            .songs()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();

        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_remote_changes_deliver_new_snapshots() {
        let context = VersoContext::new(Arc::new(MemoryStore::new()));
        let sync = synced_sync(&context, "w1");

        let mut streams = sync.attach(quiet()).await.unwrap();
        assert!(sync.songs().unwrap().is_empty());

        context
            .store
            .save_song(song("a", "Alive", None, Some("w1")))
            .await
            .unwrap();

        timeout(Duration::from_secs(1), streams.songs.changed())
            .await
            .expect("snapshot arrives")
            .unwrap();

        assert_eq!(sync.songs().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_optimistic_write_applies_and_rolls_back() {
        let context = VersoContext::new(Arc::new(MemoryStore::new()));
        let sync = synced_sync(&context, "w1");
        let mut streams = sync.attach(quiet()).await.unwrap();

        // An optimistic save the store never acknowledges
        context.emit(VersoEvent::SongSaved {
            song: song("a", "Alive", None, Some("w1")),
            write_id: 1,
        });

        timeout(Duration::from_secs(1), streams.songs.changed())
            .await
            .expect("optimistic snapshot arrives")
            .unwrap();
        assert_eq!(sync.songs().unwrap().len(), 1);

        context.emit(VersoEvent::WriteFailed {
            write_id: 1,
            collection: Collection::Songs,
            entity_id: "a".to_string(),
        });

        timeout(Duration::from_secs(1), streams.songs.changed())
            .await
            .expect("rollback snapshot arrives")
            .unwrap();
        assert!(sync.songs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detached_subscription_never_delivers() {
        let context = VersoContext::new(Arc::new(MemoryStore::new()));
        let sync = synced_sync(&context, "w1");

        let mut streams = sync.attach(quiet()).await.unwrap();
        sync.detach();

        context
            .store
            .save_song(song("a", "Alive", None, Some("w1")))
            .await
            .unwrap();

        // Either the channel timed out or it closed; a new snapshot is the
        // only unacceptable outcome
        let result = timeout(Duration::from_millis(200), streams.songs.changed()).await;
        assert!(!matches!(result, Ok(Ok(()))), "stale stream must not deliver");
        assert!(!sync.is_attached());
    }

    #[tokio::test]
    async fn test_leaving_synced_phase_detaches() {
        let context = VersoContext::new(Arc::new(MemoryStore::new()));

        let dir = tempfile::tempdir().unwrap();
        let local = crate::LocalStore::new(dir.path());

        let tracker = Arc::new(SessionTracker::confirmed(user()));
        let sync = WorkspaceSync::new(&context, tracker.clone(), "u1");
        sync.attach(quiet()).await.unwrap();

        tracker.sign_out(&local);
        assert_eq!(tracker.phase(), SessionPhase::LoggedOut);

        for _ in 0..50 {
            if !sync.is_attached() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        assert!(!sync.is_attached());
    }

    #[tokio::test]
    async fn test_reattach_supersedes_previous_generation() {
        let context = VersoContext::new(Arc::new(MemoryStore::new()));
        let sync = synced_sync(&context, "w1");

        let stale = sync.attach(quiet()).await.unwrap();
        let fresh = sync.attach(quiet()).await.unwrap();

        assert!(!stale.songs.same_channel(&fresh.songs));
    }
}

fn spawn_predicate_task<T>(
    collection: Collection,
    predicate: QueryPredicate,
    query: QueryFn<T>,
    merge: Arc<Mutex<DualQueryMerge<T>>>,
    tx: Arc<watch::Sender<Vec<T>>>,
    mut changes: broadcast::Receiver<ChangeEvent>,
    on_fault: FaultHandler,
) -> JoinHandle<()>
where
    T: SyncEntity + Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            // Wait for a change that touches this collection
            loop {
                match changes.recv().await {
                    Ok(event) if event.collection == collection => break,
                    Ok(_) => continue,
                    // Missed notifications just mean a refresh is due
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }

            match query().await {
                Ok(items) => {
                    let snapshot = merge.lock().apply_snapshot(predicate, items);
                    tx.send_replace(snapshot);
                }
                Err(e) if e.is_permission_denied() => {
                    on_fault(SyncFault::PermissionDenied { collection });
                    return;
                }
                Err(e) => {
                    log::error!("Live query on {collection:?} failed: {e}");
                    on_fault(SyncFault::Stream {
                        collection,
                        message: e.to_string(),
                    });
                    return;
                }
            }
        }
    })
}

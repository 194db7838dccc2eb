//! End-to-end flows through the collab system against the in-process store.

use std::sync::Arc;

use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tokio::time::{timeout, Duration};

use verso_collab::{
    Composer, LocalStore, MemoryStore, NewRehearsal, NewRehearsalOption, NewSong, RehearsalStatus,
    SessionData, TokenIdentity, Verso,
};

fn verso() -> Verso {
    Verso::new(
        Arc::new(MemoryStore::new()),
        Arc::new(TokenIdentity),
        Composer::new(None, "https://example.invalid"),
    )
}

fn credential(sub: &str, name: &str) -> String {
    let claims = json!({
        "sub": sub,
        "name": name,
        "email": format!("{sub}@example.com"),
        "picture": "",
    });

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"irrelevant"),
    )
    .unwrap()
}

async fn login(verso: &Verso, local: &LocalStore, sub: &str) -> SessionData {
    let tracker = verso.restore_session(local);

    verso
        .login(&credential(sub, sub), &tracker, local)
        .await
        .unwrap()
}

fn studio_option() -> NewRehearsalOption {
    NewRehearsalOption {
        date: "2024-06-01".to_string(),
        time: "19:00".to_string(),
        location: "Studio A".to_string(),
    }
}

#[tokio::test]
async fn proposing_voting_and_confirming() {
    let verso = verso();
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStore::new(dir.path());

    let session = login(&verso, &local, "u1").await;

    let rehearsal = verso
        .rehearsals
        .propose(NewRehearsal {
            title: "Friday night".to_string(),
            first_option: studio_option(),
            proposer_id: session.user.id.clone(),
            workspace_id: session.active_workspace_id.clone(),
        })
        .await
        .unwrap();

    assert_eq!(rehearsal.status, RehearsalStatus::Proposed);
    assert_eq!(rehearsal.options[0].voter_ids, vec!["u1"]);

    // A bandmate joins the vote, changes their mind, votes again
    let option_id = rehearsal.options[0].id.clone();
    verso
        .rehearsals
        .toggle_vote(&rehearsal.id, &option_id, "u2")
        .await
        .unwrap();
    verso
        .rehearsals
        .toggle_vote(&rehearsal.id, &option_id, "u2")
        .await
        .unwrap();
    let updated = verso
        .rehearsals
        .toggle_vote(&rehearsal.id, &option_id, "u2")
        .await
        .unwrap();

    assert_eq!(updated.options[0].voter_ids, vec!["u1", "u2"]);

    let confirmed = verso
        .rehearsals
        .confirm(&rehearsal.id, &option_id)
        .await
        .unwrap();

    assert_eq!(confirmed.status, RehearsalStatus::Confirmed);
    assert_eq!(confirmed.confirmed_option_id.as_deref(), Some(option_id.as_str()));
    assert!(confirmed.confirmed_option().is_some());
}

#[tokio::test]
async fn band_invite_and_workspace_sync() {
    let verso = verso();
    let dir = tempfile::tempdir().unwrap();

    let local_u1 = LocalStore::new(dir.path().join("u1"));
    let local_u2 = LocalStore::new(dir.path().join("u2"));

    let session_u1 = login(&verso, &local_u1, "u1").await;
    let session_u2 = login(&verso, &local_u2, "u2").await;

    let band = verso
        .workspaces
        .create_band("Attic Sessions".to_string(), &session_u1.user)
        .await
        .unwrap();

    // u2 opens the invitation link
    let (band, session_u2) = verso
        .workspaces
        .join_from_invite(&session_u2, &band.id)
        .await
        .unwrap();

    assert!(band.is_member("u2"));
    assert_eq!(session_u2.active_workspace_id, band.id);

    // u1 adds a song into the band workspace
    verso
        .songs
        .create(NewSong {
            title: "Black".to_string(),
            artist: "Pearl Jam".to_string(),
            content: String::new(),
            key: None,
            owner_id: session_u1.user.id.clone(),
            workspace_id: band.id.clone(),
        })
        .await
        .unwrap();

    // u2's live sync on the band workspace sees it
    let tracker = Arc::new(verso_collab::SessionTracker::confirmed(
        session_u2.user.clone(),
    ));
    let sync = verso.sync_workspace(tracker, band.id.clone());
    sync.attach(Arc::new(|_| {})).await.unwrap();

    let songs = sync.songs().unwrap();
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0].title, "Black");
}

#[tokio::test]
async fn guest_views_shared_rehearsal_with_linked_setlist() {
    let verso = verso();
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStore::new(dir.path());

    let session = login(&verso, &local, "u1").await;

    let song = verso
        .songs
        .create(NewSong {
            title: "Black".to_string(),
            artist: "Pearl Jam".to_string(),
            content: String::new(),
            key: None,
            owner_id: session.user.id.clone(),
            workspace_id: session.user.id.clone(),
        })
        .await
        .unwrap();

    let setlist = verso
        .setlists
        .create(verso_collab::NewSetlist {
            title: "Covers".to_string(),
            description: String::new(),
            owner_id: session.user.id.clone(),
            workspace_id: session.user.id.clone(),
        })
        .await
        .unwrap();
    let setlist = verso.setlists.toggle_song(&setlist.id, &song.id).await.unwrap();

    let rehearsal = verso
        .rehearsals
        .propose(NewRehearsal {
            title: "Friday night".to_string(),
            first_option: studio_option(),
            proposer_id: session.user.id.clone(),
            workspace_id: session.user.id.clone(),
        })
        .await
        .unwrap();
    verso
        .rehearsals
        .link_setlist(&rehearsal.id, Some(setlist.id.clone()))
        .await
        .unwrap();

    // A guest from another workspace follows the shared link. Their local
    // snapshots hold neither the setlist nor the songs.
    let shared = verso.workspaces.shared_rehearsal(&rehearsal.id).await.unwrap();
    let resolved = verso
        .setlists
        .resolve_rehearsal_songs(&shared, &[], &[])
        .await
        .unwrap();

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].id, song.id);
}

#[tokio::test]
async fn optimistic_snapshot_reaches_live_sync() {
    let verso = verso();
    let dir = tempfile::tempdir().unwrap();
    let local = LocalStore::new(dir.path());

    let session = login(&verso, &local, "u1").await;

    let tracker = Arc::new(verso_collab::SessionTracker::confirmed(session.user.clone()));
    let sync = verso.sync_workspace(tracker, session.user.id.clone());
    let mut streams = sync.attach(Arc::new(|_| {})).await.unwrap();

    verso
        .rehearsals
        .propose(NewRehearsal {
            title: "Friday night".to_string(),
            first_option: studio_option(),
            proposer_id: session.user.id.clone(),
            workspace_id: session.user.id.clone(),
        })
        .await
        .unwrap();

    timeout(Duration::from_secs(1), streams.rehearsals.changed())
        .await
        .expect("snapshot arrives")
        .unwrap();

    let rehearsals = sync.rehearsals().unwrap();
    assert_eq!(rehearsals.len(), 1);
    assert_eq!(rehearsals[0].title, "Friday night");
}

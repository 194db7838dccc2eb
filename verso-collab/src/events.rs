use tokio::sync::broadcast;

use crate::{
    BandData, BandMemberData, Collection, RehearsalData, SetlistData, SongData, UserData, WriteId,
};

pub type EventSender = broadcast::Sender<VersoEvent>;
pub type EventReceiver = broadcast::Receiver<VersoEvent>;

/// Events emitted by the verso system.
///
/// Entity `*Saved`/`*Deleted` events are emitted before the store write
/// completes, carrying the optimistic state. The matching [VersoEvent::WriteCommitted]
/// or [VersoEvent::WriteFailed] follows once the write settles.
#[derive(Debug, Clone)]
pub enum VersoEvent {
    /// A user completed a credential login
    UserLoggedIn { user: UserData },
    /// A session was ended by explicit sign-out
    SessionEnded { user_id: String },
    /// A band was created
    BandCreated { band: BandData },
    /// A user became a member of a band
    MemberJoined {
        band_id: String,
        new_member: BandMemberData,
    },
    /// A band was deleted by its creator
    BandDeleted { band_id: String },
    /// A session moved to another workspace
    WorkspaceSwitched {
        user_id: String,
        workspace_id: String,
    },
    SongSaved { song: SongData, write_id: WriteId },
    SongDeleted { song_id: String, write_id: WriteId },
    SetlistSaved {
        setlist: SetlistData,
        write_id: WriteId,
    },
    SetlistDeleted {
        setlist_id: String,
        write_id: WriteId,
    },
    RehearsalSaved {
        rehearsal: RehearsalData,
        write_id: WriteId,
    },
    RehearsalDeleted {
        rehearsal_id: String,
        write_id: WriteId,
    },
    /// A winning option was selected for a rehearsal
    RehearsalConfirmed {
        rehearsal_id: String,
        option_id: String,
    },
    /// An optimistic write was acknowledged by the store
    WriteCommitted {
        write_id: WriteId,
        collection: Collection,
        entity_id: String,
        /// The revision the store assigned to the settled document
        revision: u64,
    },
    /// An optimistic write was rejected; local state rolls back
    WriteFailed {
        write_id: WriteId,
        collection: Collection,
        entity_id: String,
    },
}

use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::audio::session::PlaybackSession;

/// A registered session: its lock plus a token that `stop` trips without
/// waiting for the lock, so a pending stream open gives up early.
#[derive(Clone)]
pub struct SharedSession {
    session: Arc<Mutex<PlaybackSession>>,
    cancel: CancellationToken,
}

impl SharedSession {
    fn new(session: PlaybackSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            cancel: CancellationToken::new(),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, PlaybackSession> {
        self.session.lock().await
    }

    pub async fn lock_owned(&self) -> OwnedMutexGuard<PlaybackSession> {
        self.session.clone().lock_owned().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether both handles refer to the same session.
    pub fn same(&self, other: &SharedSession) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }
}

/// Guild → session map. The only place sessions are created or removed.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, SharedSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SharedSession> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    /// Returns the guild's session, creating it with `make` if there is none.
    /// The flag is true only for the caller whose session was stored.
    pub fn create_or_get(
        &self,
        guild_id: GuildId,
        make: impl FnOnce() -> PlaybackSession,
    ) -> (SharedSession, bool) {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let session = SharedSession::new(make());
                entry.insert(session.clone());
                debug!("🆕 Session created for guild {}", guild_id);
                (session, true)
            }
        }
    }

    /// Whether `session` is the one currently stored for `guild_id`.
    pub fn holds(&self, guild_id: GuildId, session: &SharedSession) -> bool {
        self.sessions
            .get(&guild_id)
            .is_some_and(|stored| stored.value().same(session))
    }

    /// Removes the entry for `guild_id` if it still points at `session`.
    pub fn delete(&self, guild_id: GuildId, session: &SharedSession) -> bool {
        let removed = self
            .sessions
            .remove_if(&guild_id, |_, stored| stored.same(session))
            .is_some();
        if removed {
            debug!("🗑️ Session removed for guild {}", guild_id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::PlayableItem;
    use serenity::model::id::ChannelId;

    fn make(title: &str) -> PlaybackSession {
        PlaybackSession::new(
            GuildId::new(1),
            ChannelId::new(10),
            ChannelId::new(20),
            PlayableItem::new(title, "https://x/a"),
            0.5,
        )
    }

    #[tokio::test]
    async fn second_create_observes_first() {
        let registry = SessionRegistry::new();
        let guild = GuildId::new(1);

        let (first, created_first) = registry.create_or_get(guild, || make("A"));
        let (second, created_second) = registry.create_or_get(guild, || make("B"));

        assert!(created_first);
        assert!(!created_second);
        assert!(first.same(&second));
        assert_eq!(second.lock().await.queue()[0].title(), "A");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn delete_only_removes_matching_session() {
        let registry = SessionRegistry::new();
        let guild = GuildId::new(1);

        let (old, _) = registry.create_or_get(guild, || make("A"));
        assert!(registry.delete(guild, &old));
        let (new, _) = registry.create_or_get(guild, || make("B"));

        // a late teardown of the old session must not evict the new one
        assert!(!registry.delete(guild, &old));
        assert!(registry.holds(guild, &new));
        assert!(!registry.holds(guild, &old));
        assert!(registry.get(guild).is_some());
    }

    #[test]
    fn cancelling_one_session_leaves_the_next_untouched() {
        let registry = SessionRegistry::new();
        let guild = GuildId::new(1);

        let (old, _) = registry.create_or_get(guild, || make("A"));
        old.cancel();
        registry.delete(guild, &old);
        let (new, _) = registry.create_or_get(guild, || make("B"));

        assert!(old.cancellation().is_cancelled());
        assert!(!new.cancellation().is_cancelled());
    }

    #[test]
    fn guilds_are_independent() {
        let registry = SessionRegistry::new();
        registry.create_or_get(GuildId::new(1), || make("A"));
        registry.create_or_get(GuildId::new(2), || make("B"));
        assert_eq!(registry.len(), 2);
        assert!(registry.get(GuildId::new(3)).is_none());
    }
}

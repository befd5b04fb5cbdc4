//! The channel engine: owns one channel's append log, linearizer, and
//! materialized view, and exposes the mutator API every op kind goes
//! through.
//!
//! A single `tokio::sync::Mutex`-guarded mutation path: one async task
//! holds the lock across validate-append-apply so two concurrent
//! mutations can never interleave.

use crate::acl::{required_role, satisfies};
use crate::applier::ChannelApplier;
use crate::metrics::ChannelMetrics;
use crate::rate_limit::WriterRateLimiter;
use crate::state::ChannelState;
use crate::view::ChannelView;
use newtube_core::{now_millis, ChannelKey, Error, Result, VideoId, WriterKey};
use newtube_identity::Keypair;
use newtube_linearizer::Linearizer;
use newtube_log::AppendLog;
use newtube_protocol::{Category, ChannelMetadata, InviteRecord, OpBody, Role, VideoRecord, WriterRecord};
use newtube_storage::KvBackend;
use parking_lot::RwLock as SyncRwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

/// A channel's full runtime: append log, linearizer, materialized view,
/// and this node's own writer identity for authoring ops into it.
pub struct Channel<B: KvBackend> {
    channel_key: ChannelKey,
    keypair: Keypair,
    append_log: AppendLog<B>,
    view: ChannelView<B>,
    metrics: Arc<ChannelMetrics>,
    rate_limiter: WriterRateLimiter,
    logical_clock: AtomicU64,
    state: SyncRwLock<ChannelState>,
    /// Serializes the linearizer/applier apply step across concurrent
    /// `propose` calls from this process. Replicated entries arriving
    /// from peers take the same lock before folding into the view.
    apply_lock: AsyncMutex<(Linearizer<B>, ChannelApplier<B>)>,
}

impl<B: KvBackend> Channel<B> {
    /// Opens a channel backed by `store`, which must already be scoped
    /// to this channel (e.g. a handle from `newtube_storage::CoreStore`).
    /// Runs an initial linearizer pass over whatever is already on disk
    /// before returning `Ready`.
    pub fn open(channel_key: ChannelKey, keypair: Keypair, store: Arc<B>) -> Result<Self> {
        let state = SyncRwLock::new(ChannelState::OpeningLog);
        let append_log = AppendLog::new(store.clone());
        *state.write() = ChannelState::OpeningView;
        let view = ChannelView::new(store.clone());
        let metrics = Arc::new(ChannelMetrics::new());

        *state.write() = ChannelState::FirstApply;
        let mut linearizer = Linearizer::open(store.clone())?;
        let mut applier = ChannelApplier::new(store, metrics.clone());
        // No other task can hold `apply_lock` yet, so the first pass
        // runs directly against the owned values before they move into
        // it, rather than requiring `open` itself to be async.
        linearizer.update(&append_log, &mut applier)?;

        let channel = Self {
            channel_key,
            keypair,
            append_log,
            view,
            metrics,
            rate_limiter: WriterRateLimiter::new(),
            logical_clock: AtomicU64::new(0),
            state,
            apply_lock: AsyncMutex::new((linearizer, applier)),
        };
        *channel.state.write() = ChannelState::Ready;
        info!(channel = %channel_key, "channel ready");
        Ok(channel)
    }

    #[must_use]
    pub fn key(&self) -> ChannelKey {
        self.channel_key
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.state.read()
    }

    #[must_use]
    pub fn writer_key(&self) -> WriterKey {
        self.keypair.public_key().writer_key()
    }

    fn own_role(&self) -> Result<Option<Role>> {
        self.view.role_of(&self.writer_key())
    }

    fn is_genesis(&self) -> Result<bool> {
        Ok(self.view.list_writers()?.is_empty())
    }

    /// The 7-step apply contract every mutating op goes through:
    /// acquire the channel lock, check ACL, check the rate limit, sign
    /// the envelope, append it to this writer's own log, fold it into
    /// the view via the linearizer, and return once it is visible
    /// (read-your-writes).
    async fn propose(&self, body: OpBody) -> Result<()> {
        if !self.state().accepts_writes() {
            return Err(Error::conflict("channel is not ready for writes"));
        }

        let writer = self.writer_key();
        let genesis_bootstrap =
            self.is_genesis()? && matches!(body, OpBody::AddWriter { .. } | OpBody::UpsertWriter { .. });
        if !genesis_bootstrap {
            let role = self.own_role()?;
            let required = required_role(&body);
            let allowed = match role {
                Some(role) => satisfies(role, required),
                None => required.is_none(),
            };
            if !allowed {
                return Err(Error::permission_denied(format!(
                    "writer lacks role required for {}",
                    body.kind()
                )));
            }
        }

        if let Err(retry_after) = self.rate_limiter.check(writer) {
            self.metrics.record_rate_limited(body.kind());
            return Err(Error::conflict(format!(
                "rate limit exceeded, retry after {retry_after}s"
            )));
        }

        let logical_clock = self.logical_clock.fetch_add(1, Ordering::AcqRel) + 1;
        let created_at = now_millis();
        let envelope = newtube_protocol::OpEnvelope::sign(&self.keypair, logical_clock, created_at, body);

        let writer_log = self.append_log.writer_log(writer)?;
        writer_log.append(envelope)?;

        let mut guard = self.apply_lock.lock().await;
        let (linearizer, applier) = &mut *guard;
        linearizer.update(&self.append_log, applier)?;
        Ok(())
    }

    // --- Channel metadata ---

    pub async fn update_metadata(
        &self,
        title: Option<String>,
        description: Option<String>,
        avatar_blob_pointer: Option<String>,
        public_bee_key: Option<String>,
        comments_autobase_key: Option<String>,
    ) -> Result<()> {
        self.propose(OpBody::UpdateChannel {
            title,
            description,
            avatar_blob_pointer,
            public_bee_key,
            comments_autobase_key,
        })
        .await
    }

    pub fn metadata(&self) -> Result<Option<ChannelMetadata>> {
        self.view.metadata()
    }

    // --- Videos ---

    pub async fn add_video(
        &self,
        video_id: VideoId,
        title: String,
        description: String,
        category: Category,
        duration_seconds: u32,
        blob_pointer: String,
        thumbnail_blob_pointer: Option<String>,
    ) -> Result<()> {
        self.propose(OpBody::AddVideo {
            video_id,
            title,
            description,
            category,
            duration_seconds,
            blob_pointer,
            thumbnail_blob_pointer,
        })
        .await
    }

    pub async fn update_video(
        &self,
        video_id: VideoId,
        title: Option<String>,
        description: Option<String>,
        category: Option<Category>,
        blob_pointer: Option<String>,
        thumbnail_blob_pointer: Option<String>,
    ) -> Result<()> {
        self.propose(OpBody::UpdateVideo {
            video_id,
            title,
            description,
            category,
            blob_pointer,
            thumbnail_blob_pointer,
        })
        .await
    }

    pub async fn delete_video(&self, video_id: VideoId) -> Result<()> {
        self.propose(OpBody::DeleteVideo { video_id }).await
    }

    pub fn get_video(&self, video_id: &VideoId) -> Result<Option<VideoRecord>> {
        self.view.video(video_id)
    }

    pub fn list_videos(&self) -> Result<Vec<VideoRecord>> {
        self.view.list_videos()
    }

    // --- Writers ---

    pub async fn add_writer(&self, writer_key: WriterKey, role: Role) -> Result<()> {
        self.propose(OpBody::AddWriter { writer_key, role }).await
    }

    pub async fn upsert_writer(&self, writer_key: WriterKey, role: Role) -> Result<()> {
        self.propose(OpBody::UpsertWriter { writer_key, role }).await
    }

    /// A writer may remove any other writer (subject to the owner-only
    /// ACL check in `propose`) but never itself — that would strand the
    /// channel with no owner able to undo the removal.
    pub async fn remove_writer(&self, writer_key: WriterKey) -> Result<()> {
        if writer_key == self.writer_key() {
            return Err(Error::permission_denied("a writer may not remove itself"));
        }
        self.propose(OpBody::RemoveWriter { writer_key }).await
    }

    pub fn list_writers(&self) -> Result<Vec<WriterRecord>> {
        self.view.list_writers()
    }

    // --- Invites ---

    pub async fn create_invite(&self, invite_id: String, role: Role, expires_at: u64) -> Result<()> {
        self.propose(OpBody::AddInvite {
            invite_id,
            role,
            expires_at,
        })
        .await
    }

    pub async fn clear_invite(&self, invite_id: String) -> Result<()> {
        self.propose(OpBody::DeleteInvite { invite_id }).await
    }

    pub fn get_invite(&self, invite_id: &str) -> Result<Option<InviteRecord>> {
        self.view.invite(invite_id)
    }

    pub fn list_invites(&self) -> Result<Vec<InviteRecord>> {
        self.view.list_invites()
    }

    /// The channel's one active invite, if any, per the `invites/current`
    /// pointer maintained by `ChannelApplier` (invariant #3: at most one
    /// active invite at a time).
    pub fn current_invite(&self) -> Result<Option<InviteRecord>> {
        match self.view.current_invite_id()? {
            Some(id) => self.view.invite(&id),
            None => Ok(None),
        }
    }

    /// Folds replicated entries from peer writer logs into the view.
    /// Called by `newtube_swarm` after `WriterLog::append_replicated`
    /// accepts a peer's entries.
    pub async fn sync_view(&self) -> Result<u64> {
        let mut guard = self.apply_lock.lock().await;
        let (linearizer, applier) = &mut *guard;
        linearizer.update(&self.append_log, applier)
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<ChannelMetrics> {
        self.metrics.clone()
    }
}

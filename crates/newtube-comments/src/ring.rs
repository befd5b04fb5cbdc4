//! The comments ring engine: a secondary, channel-shaped log that
//! accepts comment/reaction ops from any signer, auto-admitting
//! first-time commenters the way `newtube_channel::Channel` admits
//! pre-registered writers.

use crate::applier::CommentsApplier;
use crate::view::{CommentRecord, ReactionRecord, RingView};
use newtube_core::{now_millis, Error, Result, VideoId, WriterKey};
use newtube_identity::Keypair;
use newtube_linearizer::Linearizer;
use newtube_log::AppendLog;
use newtube_protocol::{OpBody, OpEnvelope, Role};
use newtube_storage::KvBackend;
use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

const MAX_COMMENT_BYTES: usize = 5000;
const QUEUED_WAIT: Duration = Duration::from_millis(2_500);
const QUEUED_POLL_INTERVAL: Duration = Duration::from_millis(100);
const ACKNOWLEDGER_INTERVAL: Duration = Duration::from_secs(5);
const ACKNOWLEDGER_UPDATE_BUDGET: Duration = Duration::from_secs(2);

/// Outcome of `add_comment`: either the comment is already visible in
/// the view, or it is queued in the local log pending admission/sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddCommentOutcome {
    pub comment_id: String,
    pub queued: bool,
    pub success: bool,
}

fn random_comment_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A per-channel open-participation comments ring.
pub struct CommentsRing<B: KvBackend> {
    keypair: Keypair,
    append_log: AppendLog<B>,
    view: RingView<B>,
    logical_clock: AtomicU64,
    apply_lock: AsyncMutex<(Linearizer<B>, CommentsApplier<B>)>,
}

impl<B: KvBackend> CommentsRing<B> {
    /// Opens the ring backed by `store` (scoped separately from the
    /// parent channel's own store — see `ChannelMetadata.comments_autobase_key`).
    pub fn open(keypair: Keypair, store: Arc<B>) -> Result<Self> {
        let append_log = AppendLog::new(store.clone());
        let view = RingView::new(store.clone());
        let mut linearizer = Linearizer::open(store.clone())?;
        let mut applier = CommentsApplier::new(store);
        linearizer.update(&append_log, &mut applier)?;

        Ok(Self {
            keypair,
            append_log,
            view,
            logical_clock: AtomicU64::new(0),
            apply_lock: AsyncMutex::new((linearizer, applier)),
        })
    }

    #[must_use]
    pub fn writer_key(&self) -> WriterKey {
        self.keypair.public_key().writer_key()
    }

    fn is_writable(&self) -> Result<bool> {
        self.view.is_admitted(&self.writer_key())
    }

    fn next_envelope(&self, body: OpBody) -> OpEnvelope {
        let clock = self.logical_clock.fetch_add(1, Ordering::AcqRel) + 1;
        OpEnvelope::sign(&self.keypair, clock, now_millis(), body)
    }

    async fn fold(&self) -> Result<u64> {
        let mut guard = self.apply_lock.lock().await;
        let (linearizer, applier) = &mut *guard;
        linearizer.update(&self.append_log, applier)
    }

    /// Appends `body` to this writer's own log without an upfront
    /// permission check: comment/reaction ops are open-participation
    /// (any signer may attempt them) and moderation ops are gated at
    /// apply time by `CommentsApplier`, since the local role can change
    /// between proposing and applying.
    fn append_local(&self, body: OpBody) -> Result<()> {
        let envelope = self.next_envelope(body);
        self.append_log.writer_log(self.writer_key())?.append(envelope)?;
        Ok(())
    }

    /// Adds a comment. `text` must be non-empty and at most 5000 bytes.
    ///
    /// If this writer is already admitted, the comment is folded into
    /// the view immediately. Otherwise the op is appended optimistically
    /// and this call waits up to 2.5s for the admission+apply round
    /// trip to make it visible; if the wait elapses the comment stays
    /// queued in the local log and this returns `queued: true` rather
    /// than an error — the caller already succeeded at submitting it.
    pub async fn add_comment(&self, video_id: VideoId, text: String) -> Result<AddCommentOutcome> {
        if text.is_empty() || text.as_bytes().len() > MAX_COMMENT_BYTES {
            return Err(Error::invalid_input(
                "text",
                "comment text must be 1..=5000 bytes",
            ));
        }
        let comment_id = random_comment_id();
        self.append_local(OpBody::AddComment {
            comment_id: comment_id.clone(),
            video_id,
            text,
        })?;

        let writable = self.is_writable()?;
        self.fold().await?;
        if writable || self.view.comment(&comment_id)?.is_some() {
            return Ok(AddCommentOutcome {
                comment_id,
                queued: false,
                success: true,
            });
        }

        let deadline = tokio::time::Instant::now() + QUEUED_WAIT;
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(QUEUED_POLL_INTERVAL).await;
            self.fold().await?;
            if self.view.comment(&comment_id)?.is_some() {
                return Ok(AddCommentOutcome {
                    comment_id,
                    queued: false,
                    success: true,
                });
            }
        }

        debug!(%comment_id, "comment not yet admitted after bounded wait, leaving queued");
        Ok(AddCommentOutcome {
            comment_id,
            queued: true,
            success: true,
        })
    }

    /// Requires the local writer to be admitted and hold at least
    /// [`Role::Moderator`].
    pub async fn hide_comment(&self, comment_id: String) -> Result<()> {
        self.require_moderator()?;
        self.append_local(OpBody::HideComment { comment_id })?;
        self.fold().await?;
        Ok(())
    }

    /// Requires the local writer to be admitted and either hold at
    /// least [`Role::Moderator`] or be the comment's own author.
    pub async fn remove_comment(&self, comment_id: String) -> Result<()> {
        let role = self.view.role_of(&self.writer_key())?;
        let is_author = self
            .view
            .comment(&comment_id)?
            .is_some_and(|c| c.author == self.writer_key());
        if role.map(|r| r < Role::Moderator).unwrap_or(true) && !is_author {
            return Err(Error::permission_denied(
                "removing a comment requires moderator role or being its author",
            ));
        }
        self.append_local(OpBody::RemoveComment { comment_id })?;
        self.fold().await?;
        Ok(())
    }

    fn require_moderator(&self) -> Result<()> {
        match self.view.role_of(&self.writer_key())? {
            Some(role) if role >= Role::Moderator => Ok(()),
            _ => Err(Error::permission_denied("hiding a comment requires moderator role")),
        }
    }

    pub async fn add_reaction(
        &self,
        comment_id: String,
        video_id: VideoId,
        emoji: String,
    ) -> Result<()> {
        self.append_local(OpBody::AddReaction {
            comment_id,
            video_id,
            emoji,
        })?;
        self.fold().await?;
        Ok(())
    }

    pub async fn remove_reaction(&self, comment_id: String, video_id: VideoId, emoji: String) -> Result<()> {
        self.append_local(OpBody::RemoveReaction {
            comment_id,
            video_id,
            emoji,
        })?;
        self.fold().await?;
        Ok(())
    }

    pub fn list_comments(&self, video_id: &VideoId) -> Result<Vec<CommentRecord>> {
        Ok(self
            .view
            .list_comments(video_id)?
            .into_iter()
            .filter(|c| !c.hidden)
            .collect())
    }

    pub fn list_reactions(&self, video_id: &VideoId) -> Result<Vec<ReactionRecord>> {
        self.view.list_reactions(video_id)
    }

    /// Folds replicated entries from peer writer logs into the view.
    pub async fn sync_view(&self) -> Result<u64> {
        self.fold().await
    }

    /// Runs the acknowledger's periodic background loop: every
    /// [`ACKNOWLEDGER_INTERVAL`], spends up to
    /// [`ACKNOWLEDGER_UPDATE_BUDGET`] folding newly-replicated optimistic
    /// entries, so pending admissions are processed even when no reader
    /// is actively driving `fold` via a mutator call. Runs until
    /// `shutdown` fires.
    pub async fn run_acknowledger(&self, shutdown: tokio_util::sync::CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("acknowledger loop shutting down");
                    return;
                }
                _ = tokio::time::sleep(ACKNOWLEDGER_INTERVAL) => {
                    let _ = tokio::time::timeout(ACKNOWLEDGER_UPDATE_BUDGET, self.fold()).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newtube_storage::MemoryBackend;

    fn open_ring() -> CommentsRing<MemoryBackend> {
        CommentsRing::open(Keypair::generate(), Arc::new(MemoryBackend::new())).unwrap()
    }

    #[tokio::test]
    async fn add_comment_admits_writer_and_becomes_visible_immediately() {
        let ring = open_ring();
        let video_id = VideoId::random();
        let outcome = ring.add_comment(video_id, "hello".into()).await.unwrap();
        assert!(!outcome.queued);
        assert!(outcome.success);
        assert_eq!(ring.list_comments(&video_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_and_oversized_text_are_rejected() {
        let ring = open_ring();
        assert!(ring.add_comment(VideoId::random(), String::new()).await.is_err());
        assert!(ring
            .add_comment(VideoId::random(), "x".repeat(5001))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn exactly_5000_bytes_is_accepted() {
        let ring = open_ring();
        let outcome = ring
            .add_comment(VideoId::random(), "x".repeat(5000))
            .await
            .unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn author_can_remove_own_comment_without_moderator_role() {
        let ring = open_ring();
        let video_id = VideoId::random();
        let outcome = ring.add_comment(video_id, "hi".into()).await.unwrap();
        ring.remove_comment(outcome.comment_id).await.unwrap();
        assert_eq!(ring.list_comments(&video_id).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn device_role_cannot_hide_comments() {
        let ring = open_ring();
        let video_id = VideoId::random();
        ring.add_comment(video_id, "hi".into()).await.unwrap();
        // The local writer auto-admitted at `Role::Device` via its own
        // comment, so it holds no moderator privileges over anyone's
        // comments, including its own.
        assert!(ring.hide_comment("c1".into()).await.is_err());
    }

    #[tokio::test]
    async fn reaction_is_scoped_by_video_not_just_comment() {
        let ring = open_ring();
        let video_id = VideoId::random();
        let outcome = ring.add_comment(video_id, "hi".into()).await.unwrap();

        ring.add_reaction(outcome.comment_id.clone(), video_id, "👍".into())
            .await
            .unwrap();
        assert_eq!(ring.list_reactions(&video_id).unwrap().len(), 1);

        let other_video = VideoId::random();
        assert!(ring.list_reactions(&other_video).unwrap().is_empty());

        ring.remove_reaction(outcome.comment_id, video_id, "👍".into())
            .await
            .unwrap();
        assert!(ring.list_reactions(&video_id).unwrap().is_empty());
    }
}

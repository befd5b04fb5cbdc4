//! Folds linearized comments-ring entries into the ring's view,
//! admitting optimistic writers on the fly.
//!
//! Admission happens automatically rather than by a human admin: any
//! signer may attempt `add-comment`/`add-reaction`/`remove-reaction`,
//! and the first such op from an unadmitted writer triggers admission
//! on the spot, re-checking state at apply time the same way
//! `newtube_channel::applier` does.

use crate::view::{CommentRecord, ReactionRecord, RingView, RingWriterRecord};
use newtube_core::{Error, Result, WriterKey};
use newtube_linearizer::Applier;
use newtube_log::LogEntry;
use newtube_protocol::{OpBody, Role};
use newtube_storage::KvBackend;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const MAX_COMMENT_BYTES: usize = 5000;
const ACK_BACKOFFS_MS: [u64; 3] = [100, 200, 400];

/// Ops an unadmitted (optimistic) writer may trigger automatic
/// admission for.
fn is_open_participation(op: &OpBody) -> bool {
    matches!(
        op,
        OpBody::AddComment { .. } | OpBody::AddReaction { .. } | OpBody::RemoveReaction { .. }
    )
}

pub struct CommentsApplier<B: KvBackend> {
    view: RingView<B>,
}

impl<B: KvBackend> CommentsApplier<B> {
    #[must_use]
    pub fn new(store: Arc<B>) -> Self {
        Self {
            view: RingView::new(store),
        }
    }

    /// Admits `writer` at [`Role::Device`], retrying the (local,
    /// effectively infallible) write with the spec's exponential
    /// backoff schedule so a transient storage error does not
    /// permanently strand an optimistic writer.
    fn acknowledge(&self, writer: WriterKey, now_millis: u64) -> Result<()> {
        let mut last_err = None;
        for (attempt, backoff_ms) in std::iter::once(0).chain(ACK_BACKOFFS_MS).enumerate() {
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(backoff_ms));
            }
            match self.view.admit_writer(&RingWriterRecord {
                writer_key: writer,
                role: Role::Device,
                admitted_at: now_millis,
            }) {
                Ok(()) => return Ok(()),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Internal("acknowledge failed with no error".into())))
    }

    fn apply_comment_op(&self, writer: WriterKey, created_at: u64, op: OpBody) -> Result<()> {
        match op {
            OpBody::AddComment {
                comment_id,
                video_id,
                text,
            } => {
                if text.is_empty() || text.as_bytes().len() > MAX_COMMENT_BYTES {
                    warn!(len = text.as_bytes().len(), "comment text out of bounds, skipping");
                    return Ok(());
                }
                self.view.put_comment(&CommentRecord {
                    comment_id,
                    video_id,
                    author: writer,
                    text,
                    created_at,
                    hidden: false,
                })
            }
            OpBody::HideComment { comment_id } => {
                if let Some(mut record) = self.view.comment(&comment_id)? {
                    record.hidden = true;
                    self.view.put_comment(&record)
                } else {
                    warn!(%comment_id, "hide-comment for unknown comment, skipping");
                    Ok(())
                }
            }
            OpBody::RemoveComment { comment_id } => {
                self.view.delete_comment(&comment_id)?;
                Ok(())
            }
            OpBody::AddReaction {
                comment_id,
                video_id,
                emoji,
            } => self.view.put_reaction(&ReactionRecord {
                comment_id,
                video_id,
                author: writer,
                emoji,
                created_at,
            }),
            OpBody::RemoveReaction { video_id, .. } => {
                self.view.delete_reaction(&video_id, &writer)?;
                Ok(())
            }
            other => {
                warn!(op = other.kind(), "unexpected op in comments ring, skipping");
                Ok(())
            }
        }
    }
}

impl<B: KvBackend> Applier for CommentsApplier<B> {
    fn apply(&mut self, _node_index: u64, entry: &LogEntry) -> Result<()> {
        let writer = entry.envelope.writer;
        let op = entry.envelope.body.clone();
        let created_at = entry.envelope.created_at;
        let kind = op.kind();

        let admitted = self.view.is_admitted(&writer)?;
        if !admitted {
            if !is_open_participation(&op) {
                warn!(%writer, op = kind, "moderation op from unadmitted writer, skipping");
                return Ok(());
            }
            if let Err(err) = self.acknowledge(writer, created_at) {
                warn!(%writer, %err, "failed to acknowledge optimistic writer, skipping op");
                return Ok(());
            }
        } else if let OpBody::HideComment { .. } | OpBody::RemoveComment { .. } = &op {
            if !self.may_moderate(writer, &op)? {
                warn!(%writer, op = kind, "writer lacks permission to moderate, skipping");
                return Ok(());
            }
        }

        self.apply_comment_op(writer, created_at, op)
    }
}

impl<B: KvBackend> CommentsApplier<B> {
    /// `hide-comment` requires at least [`Role::Moderator`].
    /// `remove-comment` additionally allows the comment's own author
    /// regardless of role.
    fn may_moderate(&self, writer: WriterKey, op: &OpBody) -> Result<bool> {
        let role = self.view.role_of(&writer)?.unwrap_or(Role::Device);
        if role >= Role::Moderator {
            return Ok(true);
        }
        if let OpBody::RemoveComment { comment_id } = op {
            if let Some(record) = self.view.comment(comment_id)? {
                return Ok(record.author == writer);
            }
        }
        Ok(false)
    }
}

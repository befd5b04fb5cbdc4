//! Folds linearized log entries into a channel's materialized view.
//!
//! Permissions are re-derived from the view at apply time, not carried
//! over from whatever the author's role was when the op was signed: a
//! writer removed after authoring an op but before it linearizes must
//! not have that op applied.

use crate::acl::{required_role, satisfies};
use crate::conflict::{merge_channel_meta, merge_video_meta, Candidate, VideoCandidate};
use crate::metrics::ChannelMetrics;
use crate::view::ChannelView;
use base64::Engine;
use newtube_core::{Result, WriterKey};
use newtube_linearizer::Applier;
use newtube_log::LogEntry;
use newtube_protocol::{
    ChannelMetadata, InviteRecord, OpBody, Role, VectorIndexRecord, VideoRecord, WatchEventRecord,
    WriterRecord,
};
use newtube_storage::KvBackend;
use std::sync::Arc;
use tracing::warn;

/// A decoded embedding is accepted only at exactly this byte length
/// (384 × f32), per the base64-length boundary case in §8.
const VECTOR_BYTES: usize = 1536;

/// Applies linearized ops to a channel's [`ChannelView`].
pub struct ChannelApplier<B: KvBackend> {
    view: ChannelView<B>,
    metrics: Arc<ChannelMetrics>,
}

impl<B: KvBackend> ChannelApplier<B> {
    #[must_use]
    pub fn new(store: Arc<B>, metrics: Arc<ChannelMetrics>) -> Self {
        Self {
            view: ChannelView::new(store),
            metrics,
        }
    }

    fn writer_role(&self, writer: &WriterKey) -> Result<Option<Role>> {
        self.view.role_of(writer)
    }

    /// A channel with no writers yet is in genesis: the first
    /// `AddWriter`/`UpsertWriter` op observed bootstraps its author as
    /// owner without an ACL check, since there is no owner yet to have
    /// authored it.
    fn is_genesis(&self) -> Result<bool> {
        Ok(self.view.list_writers()?.is_empty())
    }

    fn check_permission(&self, writer: &WriterKey, op: &OpBody) -> Result<bool> {
        if self.is_genesis()? && matches!(op, OpBody::AddWriter { .. } | OpBody::UpsertWriter { .. })
        {
            return Ok(true);
        }
        let role = match self.writer_role(writer)? {
            Some(role) => role,
            None => return Ok(required_role(op).is_none()),
        };
        Ok(satisfies(role, required_role(op)))
    }

    fn apply_op(&self, node_index: u64, writer: WriterKey, created_at: u64, op: OpBody) -> Result<()> {
        match op {
            OpBody::UpdateChannel {
                title,
                description,
                avatar_blob_pointer,
                public_bee_key,
                comments_autobase_key,
            } => {
                let role = self.writer_role(&writer)?.unwrap_or(Role::Device);
                let current = self.view.metadata()?;
                let new_meta = ChannelMetadata {
                    title: title.unwrap_or_default(),
                    description: description.unwrap_or_default(),
                    avatar_blob_pointer,
                    public_bee_key,
                    comments_autobase_key,
                    updated_at: created_at,
                    updated_by: writer,
                    logical_clock: node_index,
                    schema_version: newtube_core::CURRENT_SCHEMA_VERSION,
                };
                let merged = match current {
                    Some(current_meta) => {
                        let current_role = self
                            .writer_role(&current_meta.updated_by)?
                            .unwrap_or(Role::Device);
                        merge_channel_meta(
                            Candidate {
                                role: current_role,
                                logical_clock: current_meta.logical_clock,
                                meta: &current_meta,
                            },
                            Candidate {
                                role,
                                logical_clock: node_index,
                                meta: &new_meta,
                            },
                        )
                    }
                    None => new_meta,
                };
                self.view.put_metadata(&merged)
            }
            OpBody::AddVideo {
                video_id,
                title,
                description,
                category,
                duration_seconds,
                blob_pointer,
                thumbnail_blob_pointer,
            } => self.view.put_video(&VideoRecord {
                video_id,
                title,
                description,
                category,
                duration_seconds,
                blob_pointer,
                thumbnail_blob_pointer,
                author: writer,
                created_at,
                updated_at: created_at,
                updated_by: writer,
                logical_clock: node_index,
            }),
            OpBody::UpdateVideo {
                video_id,
                title,
                description,
                category,
                blob_pointer,
                thumbnail_blob_pointer,
            } => {
                if let Some(current) = self.view.video(&video_id)? {
                    let role = self.writer_role(&writer)?.unwrap_or(Role::Device);
                    let new_record = VideoRecord {
                        video_id,
                        title: title.unwrap_or_else(|| current.title.clone()),
                        description: description.unwrap_or_else(|| current.description.clone()),
                        category: category.unwrap_or(current.category),
                        duration_seconds: current.duration_seconds,
                        blob_pointer: blob_pointer.unwrap_or_else(|| current.blob_pointer.clone()),
                        thumbnail_blob_pointer: thumbnail_blob_pointer.or_else(|| current.thumbnail_blob_pointer.clone()),
                        author: current.author,
                        created_at: current.created_at,
                        updated_at: created_at,
                        updated_by: writer,
                        logical_clock: node_index,
                    };
                    let current_role = self.writer_role(&current.updated_by)?.unwrap_or(Role::Device);
                    let merged = merge_video_meta(
                        VideoCandidate {
                            role: current_role,
                            logical_clock: current.logical_clock,
                            record: &current,
                        },
                        VideoCandidate {
                            role,
                            logical_clock: node_index,
                            record: &new_record,
                        },
                    );
                    self.view.put_video(&merged)
                } else {
                    warn!(%video_id, "update-video for unknown video, skipping");
                    Ok(())
                }
            }
            OpBody::DeleteVideo { video_id } => {
                self.view.delete_video(&video_id)?;
                Ok(())
            }
            OpBody::AddWriter { writer_key, role } | OpBody::UpsertWriter { writer_key, role } => {
                self.view.put_writer(&WriterRecord {
                    writer_key,
                    role,
                    added_at: created_at,
                    added_by: writer,
                })
            }
            OpBody::RemoveWriter { writer_key } => {
                self.view.delete_writer(&writer_key)?;
                Ok(())
            }
            OpBody::AddInvite {
                invite_id,
                role,
                expires_at,
            } => {
                self.view.put_invite(&InviteRecord {
                    invite_id: invite_id.clone(),
                    role,
                    created_by: writer,
                    created_at,
                    expires_at,
                    used_at: None,
                    used_by: None,
                })?;
                // At most one active invite (invariant #3): the newest
                // `add-invite` becomes the channel's current invite,
                // superseding whatever it pointed at before.
                self.view.set_current_invite(&invite_id)
            }
            OpBody::DeleteInvite { invite_id } => {
                self.view.delete_invite(&invite_id)?;
                if self.view.current_invite_id()?.as_deref() == Some(invite_id.as_str()) {
                    self.view.clear_current_invite()?;
                }
                Ok(())
            }
            OpBody::AddVectorIndex {
                video_id,
                vector_base64,
            } => {
                let decoded = match base64::engine::general_purpose::STANDARD.decode(&vector_base64) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        warn!(%video_id, %err, "vector base64 invalid, skipping");
                        return Ok(());
                    }
                };
                if decoded.len() != VECTOR_BYTES {
                    warn!(%video_id, len = decoded.len(), "decoded vector wrong byte length, skipping");
                    return Ok(());
                }
                self.view.put_vector_index(&VectorIndexRecord {
                    video_id,
                    vector_base64,
                    updated_at: created_at,
                })
            }
            OpBody::LogWatchEvent {
                video_id,
                watched_at,
                duration_seconds,
            } => {
                // `event_id` must be derivable only from `(op, view,
                // node_index)`, never from wall-clock time or randomness;
                // `node_index` is already a unique, deterministic
                // per-entry position in the linearized log.
                let event_id = format!("{node_index:020}");
                self.view.put_watch_event(&WatchEventRecord {
                    video_id,
                    event_id,
                    watcher: writer,
                    watched_at,
                    duration_seconds,
                })
            }
            // Comments and reactions are materialized by
            // `newtube_comments` against its own store; the channel view
            // only gates permissions for them.
            OpBody::AddComment { .. }
            | OpBody::HideComment { .. }
            | OpBody::RemoveComment { .. }
            | OpBody::AddReaction { .. }
            | OpBody::RemoveReaction { .. } => Ok(()),
            OpBody::MigrateSchema { .. } | OpBody::Unknown { .. } => Ok(()),
        }
    }
}

impl<B: KvBackend> Applier for ChannelApplier<B> {
    fn apply(&mut self, node_index: u64, entry: &LogEntry) -> Result<()> {
        let writer = entry.envelope.writer;
        let op = &entry.envelope.body;
        let kind = op.kind();

        if !self.check_permission(&writer, op)? {
            self.metrics.record_skipped(kind);
            warn!(%writer, op = kind, "permission denied at apply time, skipping");
            return Ok(());
        }

        let created_at = entry.envelope.created_at;
        self.apply_op(node_index, writer, created_at, op.clone())?;
        self.metrics.record_applied(kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newtube_core::VideoId;
    use newtube_identity::Keypair;
    use newtube_protocol::OpEnvelope;
    use newtube_storage::MemoryBackend;

    fn entry(kp: &Keypair, seq: u64, body: OpBody) -> LogEntry {
        let envelope = OpEnvelope::sign(kp, seq + 1, 1_000 + seq, body);
        LogEntry::new(seq, newtube_log::genesis_hash(), envelope)
    }

    #[test]
    fn genesis_writer_bootstraps_without_permission_check() {
        let store = Arc::new(MemoryBackend::new());
        let metrics = Arc::new(ChannelMetrics::new());
        let mut applier = ChannelApplier::new(store, metrics);
        let kp = Keypair::generate();
        let writer = kp.public_key().writer_key();

        applier
            .apply(
                0,
                &entry(
                    &kp,
                    0,
                    OpBody::AddWriter {
                        writer_key: writer,
                        role: Role::Owner,
                    },
                ),
            )
            .unwrap();

        assert_eq!(applier.writer_role(&writer).unwrap(), Some(Role::Owner));
    }

    #[test]
    fn removed_writer_ops_are_skipped_at_apply_time() {
        let store = Arc::new(MemoryBackend::new());
        let metrics = Arc::new(ChannelMetrics::new());
        let mut applier = ChannelApplier::new(store, metrics);
        let owner = Keypair::generate();
        let device = Keypair::generate();

        applier
            .apply(
                0,
                &entry(
                    &owner,
                    0,
                    OpBody::AddWriter {
                        writer_key: owner.public_key().writer_key(),
                        role: Role::Owner,
                    },
                ),
            )
            .unwrap();
        applier
            .apply(
                1,
                &entry(
                    &owner,
                    1,
                    OpBody::AddWriter {
                        writer_key: device.public_key().writer_key(),
                        role: Role::Device,
                    },
                ),
            )
            .unwrap();
        applier
            .apply(
                2,
                &entry(
                    &owner,
                    2,
                    OpBody::RemoveWriter {
                        writer_key: device.public_key().writer_key(),
                    },
                ),
            )
            .unwrap();

        let video_id = VideoId::random();
        applier
            .apply(
                3,
                &entry(
                    &device,
                    0,
                    OpBody::AddVideo {
                        video_id,
                        title: "t".into(),
                        description: String::new(),
                        category: newtube_protocol::Category::Other,
                        duration_seconds: 1,
                        blob_pointer: "0:1:0:1".into(),
                        thumbnail_blob_pointer: None,
                    },
                ),
            )
            .unwrap();

        assert!(applier.view.video(&video_id).unwrap().is_none());
    }

    #[test]
    fn owner_update_channel_wins_over_later_device_update() {
        let store = Arc::new(MemoryBackend::new());
        let metrics = Arc::new(ChannelMetrics::new());
        let mut applier = ChannelApplier::new(store, metrics);
        let owner = Keypair::generate();
        let device = Keypair::generate();

        applier
            .apply(
                0,
                &entry(
                    &owner,
                    0,
                    OpBody::AddWriter {
                        writer_key: owner.public_key().writer_key(),
                        role: Role::Owner,
                    },
                ),
            )
            .unwrap();
        applier
            .apply(
                1,
                &entry(
                    &owner,
                    1,
                    OpBody::AddWriter {
                        writer_key: device.public_key().writer_key(),
                        role: Role::Device,
                    },
                ),
            )
            .unwrap();
        applier
            .apply(
                2,
                &entry(
                    &owner,
                    2,
                    OpBody::UpdateChannel {
                        title: Some("owner title".into()),
                        description: None,
                        avatar_blob_pointer: None,
                        public_bee_key: None,
                        comments_autobase_key: None,
                    },
                ),
            )
            .unwrap();
        applier
            .apply(
                3,
                &entry(
                    &device,
                    0,
                    OpBody::UpdateChannel {
                        title: Some("device title".into()),
                        description: None,
                        avatar_blob_pointer: None,
                        public_bee_key: None,
                        comments_autobase_key: None,
                    },
                ),
            )
            .unwrap();

        assert_eq!(applier.view.metadata().unwrap().unwrap().title, "owner title");
    }

    #[test]
    fn owner_update_video_wins_over_later_device_update() {
        let store = Arc::new(MemoryBackend::new());
        let metrics = Arc::new(ChannelMetrics::new());
        let mut applier = ChannelApplier::new(store, metrics);
        let owner = Keypair::generate();
        let device = Keypair::generate();
        let video_id = VideoId::random();

        applier
            .apply(
                0,
                &entry(
                    &owner,
                    0,
                    OpBody::AddWriter {
                        writer_key: owner.public_key().writer_key(),
                        role: Role::Owner,
                    },
                ),
            )
            .unwrap();
        applier
            .apply(
                1,
                &entry(
                    &owner,
                    1,
                    OpBody::AddWriter {
                        writer_key: device.public_key().writer_key(),
                        role: Role::Device,
                    },
                ),
            )
            .unwrap();
        applier
            .apply(
                2,
                &entry(
                    &owner,
                    2,
                    OpBody::AddVideo {
                        video_id,
                        title: "original".into(),
                        description: String::new(),
                        category: newtube_protocol::Category::Other,
                        duration_seconds: 1,
                        blob_pointer: "0:1:0:1".into(),
                        thumbnail_blob_pointer: None,
                    },
                ),
            )
            .unwrap();
        applier
            .apply(
                3,
                &entry(
                    &owner,
                    3,
                    OpBody::UpdateVideo {
                        video_id,
                        title: Some("owner title".into()),
                        description: None,
                        category: None,
                        blob_pointer: None,
                        thumbnail_blob_pointer: None,
                    },
                ),
            )
            .unwrap();
        applier
            .apply(
                4,
                &entry(
                    &device,
                    0,
                    OpBody::UpdateVideo {
                        video_id,
                        title: Some("device title".into()),
                        description: None,
                        category: None,
                        blob_pointer: None,
                        thumbnail_blob_pointer: None,
                    },
                ),
            )
            .unwrap();

        assert_eq!(applier.view.video(&video_id).unwrap().unwrap().title, "owner title");
    }

    #[test]
    fn add_invite_sets_current_pointer_and_delete_clears_it() {
        let store = Arc::new(MemoryBackend::new());
        let metrics = Arc::new(ChannelMetrics::new());
        let mut applier = ChannelApplier::new(store, metrics);
        let owner = Keypair::generate();

        applier
            .apply(
                0,
                &entry(
                    &owner,
                    0,
                    OpBody::AddWriter {
                        writer_key: owner.public_key().writer_key(),
                        role: Role::Owner,
                    },
                ),
            )
            .unwrap();
        applier
            .apply(
                1,
                &entry(
                    &owner,
                    1,
                    OpBody::AddInvite {
                        invite_id: "inv1".into(),
                        role: Role::Device,
                        expires_at: 1_000_000,
                    },
                ),
            )
            .unwrap();
        assert_eq!(applier.view.current_invite_id().unwrap().as_deref(), Some("inv1"));

        applier
            .apply(
                2,
                &entry(
                    &owner,
                    2,
                    OpBody::AddInvite {
                        invite_id: "inv2".into(),
                        role: Role::Device,
                        expires_at: 1_000_000,
                    },
                ),
            )
            .unwrap();
        assert_eq!(applier.view.current_invite_id().unwrap().as_deref(), Some("inv2"));

        applier
            .apply(
                3,
                &entry(
                    &owner,
                    3,
                    OpBody::DeleteInvite {
                        invite_id: "inv1".into(),
                    },
                ),
            )
            .unwrap();
        assert_eq!(
            applier.view.current_invite_id().unwrap().as_deref(),
            Some("inv2"),
            "deleting a stale invite must not clear the pointer to the current one"
        );

        applier
            .apply(
                4,
                &entry(
                    &owner,
                    4,
                    OpBody::DeleteInvite {
                        invite_id: "inv2".into(),
                    },
                ),
            )
            .unwrap();
        assert_eq!(applier.view.current_invite_id().unwrap(), None);
    }

    #[test]
    fn add_vector_index_rejects_wrong_decoded_length() {
        let store = Arc::new(MemoryBackend::new());
        let metrics = Arc::new(ChannelMetrics::new());
        let mut applier = ChannelApplier::new(store, metrics);
        let owner = Keypair::generate();
        let video_id = VideoId::random();

        applier
            .apply(
                0,
                &entry(
                    &owner,
                    0,
                    OpBody::AddWriter {
                        writer_key: owner.public_key().writer_key(),
                        role: Role::Owner,
                    },
                ),
            )
            .unwrap();

        let valid = base64::engine::general_purpose::STANDARD.encode([0u8; VECTOR_BYTES]);
        assert_eq!(valid.len(), 2048);
        applier
            .apply(
                1,
                &entry(
                    &owner,
                    1,
                    OpBody::AddVectorIndex {
                        video_id,
                        vector_base64: valid,
                    },
                ),
            )
            .unwrap();
        assert!(applier.view.vector_index(&video_id).unwrap().is_some());

        let other_video = VideoId::random();
        let too_short = base64::engine::general_purpose::STANDARD.encode([0u8; 100]);
        applier
            .apply(
                2,
                &entry(
                    &owner,
                    2,
                    OpBody::AddVectorIndex {
                        video_id: other_video,
                        vector_base64: too_short,
                    },
                ),
            )
            .unwrap();
        assert!(applier.view.vector_index(&other_video).unwrap().is_none());
    }

    #[test]
    fn log_watch_event_materializes_under_the_video_and_derives_event_id_from_node_index() {
        let store = Arc::new(MemoryBackend::new());
        let metrics = Arc::new(ChannelMetrics::new());
        let mut applier = ChannelApplier::new(store, metrics);
        let owner = Keypair::generate();
        let video_id = VideoId::random();

        applier
            .apply(
                0,
                &entry(
                    &owner,
                    0,
                    OpBody::AddWriter {
                        writer_key: owner.public_key().writer_key(),
                        role: Role::Owner,
                    },
                ),
            )
            .unwrap();
        applier
            .apply(
                7,
                &entry(
                    &owner,
                    1,
                    OpBody::LogWatchEvent {
                        video_id,
                        watched_at: 100,
                        duration_seconds: 30,
                    },
                ),
            )
            .unwrap();

        let events = applier.view.list_watch_events(&video_id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, format!("{:020}", 7));
    }
}

//! The signed operation envelope that every append-log entry carries.

use newtube_core::{VideoId, WriterKey, CURRENT_SCHEMA_VERSION};
use newtube_identity::{Keypair, PublicKey, Signature};
use serde::{Deserialize, Serialize};

use crate::model::{Category, Role};

/// The body of an operation: one mutation to a channel's materialized
/// view. Tagged by `type` so a forward-compat `Unknown` variant can
/// round-trip ops from a future schema version untouched.
///
/// Every op kind folded into a single enum carrying its own
/// `#[serde(tag = "type")]` DTO, rather than one wire type per kind.
/// The known, statically-typed operation variants. Mirrors `OpBody`
/// minus the `Unknown` catch-all; serde can internally-tag this one
/// directly because every variant is known at compile time. `OpBody`
/// wraps this with a hand-written `Serialize`/`Deserialize` that falls
/// back to `OpBody::Unknown` when the `type` tag doesn't match any
/// variant here, since serde's derive has no built-in "else" arm for
/// internally tagged enums.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum KnownOpBody {
    UpdateChannel {
        title: Option<String>,
        description: Option<String>,
        avatar_blob_pointer: Option<String>,
        public_bee_key: Option<String>,
        comments_autobase_key: Option<String>,
    },
    AddVideo {
        video_id: VideoId,
        title: String,
        description: String,
        category: Category,
        duration_seconds: u32,
        blob_pointer: String,
        thumbnail_blob_pointer: Option<String>,
    },
    UpdateVideo {
        video_id: VideoId,
        title: Option<String>,
        description: Option<String>,
        category: Option<Category>,
        blob_pointer: Option<String>,
        thumbnail_blob_pointer: Option<String>,
    },
    DeleteVideo {
        video_id: VideoId,
    },
    AddWriter {
        writer_key: WriterKey,
        role: Role,
    },
    UpsertWriter {
        writer_key: WriterKey,
        role: Role,
    },
    RemoveWriter {
        writer_key: WriterKey,
    },
    AddInvite {
        invite_id: String,
        role: Role,
        expires_at: u64,
    },
    DeleteInvite {
        invite_id: String,
    },
    AddComment {
        comment_id: String,
        video_id: VideoId,
        text: String,
    },
    HideComment {
        comment_id: String,
    },
    RemoveComment {
        comment_id: String,
    },
    AddReaction {
        comment_id: String,
        video_id: VideoId,
        emoji: String,
    },
    RemoveReaction {
        comment_id: String,
        video_id: VideoId,
        emoji: String,
    },
    AddVectorIndex {
        video_id: VideoId,
        /// Base64-encoded embedding vector.
        vector_base64: String,
    },
    LogWatchEvent {
        video_id: VideoId,
        watched_at: u64,
        duration_seconds: u32,
    },
    MigrateSchema {
        to_version: u32,
    },
}

/// The body of an operation: one mutation to a channel's materialized
/// view. Tagged by `type` so a forward-compat `Unknown` variant can
/// round-trip ops from a future schema version untouched.
///
/// Every op kind folded into a single enum carrying its own
/// `#[serde(tag = "type")]` DTO, rather than one wire type per kind.
#[derive(Debug, Clone)]
pub enum OpBody {
    UpdateChannel {
        title: Option<String>,
        description: Option<String>,
        avatar_blob_pointer: Option<String>,
        public_bee_key: Option<String>,
        comments_autobase_key: Option<String>,
    },
    AddVideo {
        video_id: VideoId,
        title: String,
        description: String,
        category: Category,
        duration_seconds: u32,
        blob_pointer: String,
        thumbnail_blob_pointer: Option<String>,
    },
    UpdateVideo {
        video_id: VideoId,
        title: Option<String>,
        description: Option<String>,
        category: Option<Category>,
        blob_pointer: Option<String>,
        thumbnail_blob_pointer: Option<String>,
    },
    DeleteVideo {
        video_id: VideoId,
    },
    AddWriter {
        writer_key: WriterKey,
        role: Role,
    },
    UpsertWriter {
        writer_key: WriterKey,
        role: Role,
    },
    RemoveWriter {
        writer_key: WriterKey,
    },
    AddInvite {
        invite_id: String,
        role: Role,
        expires_at: u64,
    },
    DeleteInvite {
        invite_id: String,
    },
    AddComment {
        comment_id: String,
        video_id: VideoId,
        text: String,
    },
    HideComment {
        comment_id: String,
    },
    RemoveComment {
        comment_id: String,
    },
    AddReaction {
        comment_id: String,
        video_id: VideoId,
        emoji: String,
    },
    RemoveReaction {
        comment_id: String,
        video_id: VideoId,
        emoji: String,
    },
    AddVectorIndex {
        video_id: VideoId,
        /// Base64-encoded embedding vector.
        vector_base64: String,
    },
    LogWatchEvent {
        video_id: VideoId,
        watched_at: u64,
        duration_seconds: u32,
    },
    MigrateSchema {
        to_version: u32,
    },
    /// Forward-compat catch-all: an op whose `type` this build does not
    /// recognize. Carried through the log and the linearizer unchanged
    /// so older nodes never corrupt a newer writer's history.
    Unknown {
        raw_type: String,
        raw: serde_json::Value,
    },
}

impl From<KnownOpBody> for OpBody {
    fn from(known: KnownOpBody) -> Self {
        match known {
            KnownOpBody::UpdateChannel {
                title,
                description,
                avatar_blob_pointer,
                public_bee_key,
                comments_autobase_key,
            } => Self::UpdateChannel {
                title,
                description,
                avatar_blob_pointer,
                public_bee_key,
                comments_autobase_key,
            },
            KnownOpBody::AddVideo {
                video_id,
                title,
                description,
                category,
                duration_seconds,
                blob_pointer,
                thumbnail_blob_pointer,
            } => Self::AddVideo {
                video_id,
                title,
                description,
                category,
                duration_seconds,
                blob_pointer,
                thumbnail_blob_pointer,
            },
            KnownOpBody::UpdateVideo {
                video_id,
                title,
                description,
                category,
                blob_pointer,
                thumbnail_blob_pointer,
            } => Self::UpdateVideo {
                video_id,
                title,
                description,
                category,
                blob_pointer,
                thumbnail_blob_pointer,
            },
            KnownOpBody::DeleteVideo { video_id } => Self::DeleteVideo { video_id },
            KnownOpBody::AddWriter { writer_key, role } => Self::AddWriter { writer_key, role },
            KnownOpBody::UpsertWriter { writer_key, role } => {
                Self::UpsertWriter { writer_key, role }
            }
            KnownOpBody::RemoveWriter { writer_key } => Self::RemoveWriter { writer_key },
            KnownOpBody::AddInvite {
                invite_id,
                role,
                expires_at,
            } => Self::AddInvite {
                invite_id,
                role,
                expires_at,
            },
            KnownOpBody::DeleteInvite { invite_id } => Self::DeleteInvite { invite_id },
            KnownOpBody::AddComment {
                comment_id,
                video_id,
                text,
            } => Self::AddComment {
                comment_id,
                video_id,
                text,
            },
            KnownOpBody::HideComment { comment_id } => Self::HideComment { comment_id },
            KnownOpBody::RemoveComment { comment_id } => Self::RemoveComment { comment_id },
            KnownOpBody::AddReaction {
                comment_id,
                video_id,
                emoji,
            } => Self::AddReaction {
                comment_id,
                video_id,
                emoji,
            },
            KnownOpBody::RemoveReaction {
                comment_id,
                video_id,
                emoji,
            } => Self::RemoveReaction {
                comment_id,
                video_id,
                emoji,
            },
            KnownOpBody::AddVectorIndex {
                video_id,
                vector_base64,
            } => Self::AddVectorIndex {
                video_id,
                vector_base64,
            },
            KnownOpBody::LogWatchEvent {
                video_id,
                watched_at,
                duration_seconds,
            } => Self::LogWatchEvent {
                video_id,
                watched_at,
                duration_seconds,
            },
            KnownOpBody::MigrateSchema { to_version } => Self::MigrateSchema { to_version },
        }
    }
}

/// Fails only for `OpBody::Unknown`, which has no `KnownOpBody` counterpart
/// and is serialized directly from its stored raw JSON instead.
impl TryFrom<&OpBody> for KnownOpBody {
    type Error = ();

    fn try_from(body: &OpBody) -> Result<Self, Self::Error> {
        Ok(match body.clone() {
            OpBody::UpdateChannel {
                title,
                description,
                avatar_blob_pointer,
                public_bee_key,
                comments_autobase_key,
            } => Self::UpdateChannel {
                title,
                description,
                avatar_blob_pointer,
                public_bee_key,
                comments_autobase_key,
            },
            OpBody::AddVideo {
                video_id,
                title,
                description,
                category,
                duration_seconds,
                blob_pointer,
                thumbnail_blob_pointer,
            } => Self::AddVideo {
                video_id,
                title,
                description,
                category,
                duration_seconds,
                blob_pointer,
                thumbnail_blob_pointer,
            },
            OpBody::UpdateVideo {
                video_id,
                title,
                description,
                category,
                blob_pointer,
                thumbnail_blob_pointer,
            } => Self::UpdateVideo {
                video_id,
                title,
                description,
                category,
                blob_pointer,
                thumbnail_blob_pointer,
            },
            OpBody::DeleteVideo { video_id } => Self::DeleteVideo { video_id },
            OpBody::AddWriter { writer_key, role } => Self::AddWriter { writer_key, role },
            OpBody::UpsertWriter { writer_key, role } => Self::UpsertWriter { writer_key, role },
            OpBody::RemoveWriter { writer_key } => Self::RemoveWriter { writer_key },
            OpBody::AddInvite {
                invite_id,
                role,
                expires_at,
            } => Self::AddInvite {
                invite_id,
                role,
                expires_at,
            },
            OpBody::DeleteInvite { invite_id } => Self::DeleteInvite { invite_id },
            OpBody::AddComment {
                comment_id,
                video_id,
                text,
            } => Self::AddComment {
                comment_id,
                video_id,
                text,
            },
            OpBody::HideComment { comment_id } => Self::HideComment { comment_id },
            OpBody::RemoveComment { comment_id } => Self::RemoveComment { comment_id },
            OpBody::AddReaction {
                comment_id,
                video_id,
                emoji,
            } => Self::AddReaction {
                comment_id,
                video_id,
                emoji,
            },
            OpBody::RemoveReaction {
                comment_id,
                video_id,
                emoji,
            } => Self::RemoveReaction {
                comment_id,
                video_id,
                emoji,
            },
            OpBody::AddVectorIndex {
                video_id,
                vector_base64,
            } => Self::AddVectorIndex {
                video_id,
                vector_base64,
            },
            OpBody::LogWatchEvent {
                video_id,
                watched_at,
                duration_seconds,
            } => Self::LogWatchEvent {
                video_id,
                watched_at,
                duration_seconds,
            },
            OpBody::MigrateSchema { to_version } => Self::MigrateSchema { to_version },
            OpBody::Unknown { .. } => return Err(()),
        })
    }
}

impl Serialize for OpBody {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            OpBody::Unknown { raw_type, raw } => {
                // Re-emit the original payload with its original `type`
                // tag, rather than nesting it under `raw_type`/`raw`.
                let mut value = raw.clone();
                if let serde_json::Value::Object(ref mut map) = value {
                    map.insert("type".to_string(), serde_json::Value::String(raw_type.clone()));
                }
                value.serialize(serializer)
            }
            other => KnownOpBody::try_from(other)
                .expect("non-Unknown OpBody always converts")
                .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for OpBody {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match serde_json::from_value::<KnownOpBody>(value.clone()) {
            Ok(known) => Ok(known.into()),
            Err(_) => {
                let raw_type = value
                    .get("type")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("")
                    .to_string();
                Ok(OpBody::Unknown {
                    raw_type,
                    raw: value,
                })
            }
        }
    }
}

impl OpBody {
    /// A stable name for metrics labels and log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpdateChannel { .. } => "update-channel",
            Self::AddVideo { .. } => "add-video",
            Self::UpdateVideo { .. } => "update-video",
            Self::DeleteVideo { .. } => "delete-video",
            Self::AddWriter { .. } => "add-writer",
            Self::UpsertWriter { .. } => "upsert-writer",
            Self::RemoveWriter { .. } => "remove-writer",
            Self::AddInvite { .. } => "add-invite",
            Self::DeleteInvite { .. } => "delete-invite",
            Self::AddComment { .. } => "add-comment",
            Self::HideComment { .. } => "hide-comment",
            Self::RemoveComment { .. } => "remove-comment",
            Self::AddReaction { .. } => "add-reaction",
            Self::RemoveReaction { .. } => "remove-reaction",
            Self::AddVectorIndex { .. } => "add-vector-index",
            Self::LogWatchEvent { .. } => "log-watch-event",
            Self::MigrateSchema { .. } => "migrate-schema",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Ops that only the channel owner may author.
    #[must_use]
    pub fn requires_owner(&self) -> bool {
        matches!(
            self,
            Self::AddWriter { .. }
                | Self::UpsertWriter { .. }
                | Self::RemoveWriter { .. }
                | Self::MigrateSchema { .. }
        )
    }
}

/// An append-log entry: a writer-signed, causally-ordered operation.
///
/// `logical_clock` is the writer's own per-entry Lamport-style counter,
/// used by the conflict-resolution precedence tuple alongside role
/// priority and `updatedAt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpEnvelope {
    pub schema_version: u32,
    pub writer: WriterKey,
    pub logical_clock: u64,
    pub created_at: u64,
    pub body: OpBody,
    pub signature: Signature,
}

impl OpEnvelope {
    /// Builds and signs a new envelope at the current schema version.
    pub fn sign(keypair: &Keypair, logical_clock: u64, created_at: u64, body: OpBody) -> Self {
        let writer = keypair.public_key().writer_key();
        let unsigned = UnsignedOp {
            schema_version: CURRENT_SCHEMA_VERSION,
            writer,
            logical_clock,
            created_at,
            body: &body,
        };
        let payload = unsigned.canonical_bytes();
        let signature = keypair.sign(&payload);
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            writer,
            logical_clock,
            created_at,
            body,
            signature,
        }
    }

    /// Verifies this envelope's signature against `author`, which must
    /// match `self.writer`.
    pub fn verify(&self, author: &PublicKey) -> newtube_core::Result<()> {
        if author.writer_key() != self.writer {
            return Err(newtube_core::Error::invalid_input(
                "writer",
                "public key does not match envelope writer",
            ));
        }
        let unsigned = UnsignedOp {
            schema_version: self.schema_version,
            writer: self.writer,
            logical_clock: self.logical_clock,
            created_at: self.created_at,
            body: &self.body,
        };
        let payload = unsigned.canonical_bytes();
        author.verify(&payload, &self.signature)
    }
}

/// The subset of an envelope's fields covered by the signature, kept
/// separate from `OpEnvelope` so the signature field itself is never
/// accidentally folded into its own preimage.
#[derive(Serialize)]
struct UnsignedOp<'a> {
    schema_version: u32,
    writer: WriterKey,
    logical_clock: u64,
    created_at: u64,
    body: &'a OpBody,
}

impl UnsignedOp<'_> {
    fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("UnsignedOp always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sign_and_verify_roundtrip() {
        let kp = Keypair::generate();
        let op = OpEnvelope::sign(
            &kp,
            1,
            1_000,
            OpBody::AddVideo {
                video_id: VideoId::random(),
                title: "hello".into(),
                description: String::new(),
                category: Category::Education,
                duration_seconds: 42,
                blob_pointer: "0:10:0:10".into(),
                thumbnail_blob_pointer: None,
            },
        );
        op.verify(&kp.public_key()).unwrap();
    }

    #[test]
    fn verify_rejects_wrong_author() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        let op = OpEnvelope::sign(
            &kp1,
            1,
            1_000,
            OpBody::DeleteVideo {
                video_id: VideoId::random(),
            },
        );
        assert!(op.verify(&kp2.public_key()).is_err());
    }

    #[test]
    fn verify_rejects_tampered_body() {
        let kp = Keypair::generate();
        let mut op = OpEnvelope::sign(
            &kp,
            1,
            1_000,
            OpBody::DeleteInvite {
                invite_id: "abc".into(),
            },
        );
        op.body = OpBody::DeleteInvite {
            invite_id: "xyz".into(),
        };
        assert!(op.verify(&kp.public_key()).is_err());
    }

    #[test]
    fn json_roundtrip_preserves_unknown_ops() {
        let raw = serde_json::json!({
            "type": "some-future-op",
            "foo": "bar"
        });
        let body: OpBody = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(body, OpBody::Unknown { .. }));
        let reencoded = serde_json::to_value(&body).unwrap();
        assert_eq!(reencoded["foo"], "bar");
    }

    #[test]
    fn owner_only_ops_are_flagged() {
        assert!(OpBody::RemoveWriter {
            writer_key: WriterKey::random()
        }
        .requires_owner());
        assert!(!OpBody::AddComment {
            comment_id: "c1".into(),
            video_id: VideoId::random(),
            text: "hi".into(),
        }
        .requires_owner());
    }
}

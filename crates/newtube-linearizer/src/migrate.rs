//! Schema migration registry.
//!
//! Dispatches a transform function keyed by `(op kind, schema version)`,
//! so each additive or breaking schema change registers one transform
//! without the applier needing to know about any of them.

use newtube_core::CURRENT_SCHEMA_VERSION;
use newtube_protocol::{OpBody, OpEnvelope};
use std::collections::HashMap;

type Transform = Box<dyn Fn(OpBody) -> OpBody + Send + Sync>;

/// Maps `(op kind, from_version)` to a pure transform bringing an op
/// body up to `from_version + 1`. `migrate` applies transforms
/// repeatedly until the envelope reaches [`CURRENT_SCHEMA_VERSION`].
pub struct MigrationRegistry {
    transforms: HashMap<(&'static str, u32), Transform>,
}

impl MigrationRegistry {
    /// Builds the registry with every migration this build knows about.
    #[must_use]
    pub fn new() -> Self {
        let mut transforms: HashMap<(&'static str, u32), Transform> = HashMap::new();

        // v0 -> v1: `AddVideo` gained `thumbnail_blob_pointer`, defaulted
        // to `None` for any entry authored before the field existed.
        // v0 bodies never carried it, so no transform is needed here: the
        // field is `Option` and absent-on-deserialize already yields
        // `None`. Registered as a documented no-op so the (kind, version)
        // pair is discoverable rather than silently missing.
        transforms.insert(("add-video", 0), Box::new(|body| body));

        Self { transforms }
    }

    /// Registers or overrides a transform. Exposed for tests; production
    /// migrations are all registered in [`MigrationRegistry::new`].
    pub fn register(&mut self, kind: &'static str, from_version: u32, transform: Transform) {
        self.transforms.insert((kind, from_version), transform);
    }

    /// Brings `envelope` up to [`CURRENT_SCHEMA_VERSION`], applying
    /// registered transforms in order. Ops with no registered transform
    /// for their `(kind, schema_version)` pass through unchanged — this
    /// is correct for additive schema changes (new optional fields)
    /// and only a gap for breaking changes, which must register a
    /// transform when introduced.
    #[must_use]
    pub fn migrate(&self, mut envelope: OpEnvelope) -> OpEnvelope {
        while envelope.schema_version < CURRENT_SCHEMA_VERSION {
            let kind = envelope.body.kind();
            if let Some(transform) = self.transforms.get(&(kind, envelope.schema_version)) {
                envelope.body = transform(envelope.body);
            }
            envelope.schema_version += 1;
        }
        envelope
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newtube_core::VideoId;
    use newtube_identity::Keypair;
    use pretty_assertions::assert_eq;

    #[test]
    fn migrate_bumps_schema_version_to_current() {
        let kp = Keypair::generate();
        let mut envelope = OpEnvelope::sign(
            &kp,
            1,
            1_000,
            OpBody::DeleteVideo {
                video_id: VideoId::random(),
            },
        );
        envelope.schema_version = 0;

        let registry = MigrationRegistry::new();
        let migrated = registry.migrate(envelope);
        assert_eq!(migrated.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn already_current_envelope_is_unchanged() {
        let kp = Keypair::generate();
        let envelope = OpEnvelope::sign(
            &kp,
            1,
            1_000,
            OpBody::DeleteInvite {
                invite_id: "a".into(),
            },
        );
        let registry = MigrationRegistry::new();
        let migrated = registry.migrate(envelope.clone());
        assert_eq!(migrated.schema_version, envelope.schema_version);
    }

    #[test]
    fn custom_transform_runs_for_registered_pair() {
        let kp = Keypair::generate();
        let mut envelope = OpEnvelope::sign(
            &kp,
            1,
            1_000,
            OpBody::HideComment {
                comment_id: "old-id".into(),
            },
        );
        envelope.schema_version = 0;

        let mut registry = MigrationRegistry::new();
        registry.register(
            "hide-comment",
            0,
            Box::new(|body| match body {
                OpBody::HideComment { comment_id } => OpBody::HideComment {
                    comment_id: format!("migrated-{comment_id}"),
                },
                other => other,
            }),
        );

        let migrated = registry.migrate(envelope);
        match migrated.body {
            OpBody::HideComment { comment_id } => assert_eq!(comment_id, "migrated-old-id"),
            _ => panic!("expected HideComment"),
        }
    }
}

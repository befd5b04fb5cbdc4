//! Minimum role required to author each op kind.
//!
//! A per-action requirement table. `OpBody::requires_owner` already
//! captures the owner-only subset; this table is the full gradient
//! including the `Moderator` tier.

use newtube_protocol::{OpBody, Role};

/// Returns the minimum [`Role`] required to author `op`, or `None` if
/// any writer (including a freshly paired `Device`) may author it.
#[must_use]
pub fn required_role(op: &OpBody) -> Option<Role> {
    if op.requires_owner() {
        return Some(Role::Owner);
    }
    match op {
        OpBody::HideComment { .. } | OpBody::RemoveComment { .. } => Some(Role::Moderator),
        OpBody::UpdateChannel { .. } => Some(Role::Device),
        OpBody::AddVideo { .. }
        | OpBody::UpdateVideo { .. }
        | OpBody::DeleteVideo { .. }
        | OpBody::AddInvite { .. }
        | OpBody::DeleteInvite { .. } => Some(Role::Device),
        // Comments, reactions, watch events, and vector indexes are
        // open-participation: no writer role is needed to author them,
        // only a valid signature (see `Channel::apply_comment_op`).
        OpBody::AddComment { .. }
        | OpBody::AddReaction { .. }
        | OpBody::RemoveReaction { .. }
        | OpBody::AddVectorIndex { .. }
        | OpBody::LogWatchEvent { .. } => None,
        OpBody::AddWriter { .. }
        | OpBody::UpsertWriter { .. }
        | OpBody::RemoveWriter { .. }
        | OpBody::MigrateSchema { .. } => Some(Role::Owner),
        OpBody::Unknown { .. } => None,
    }
}

/// Returns `true` if `role` meets or exceeds `required`.
#[must_use]
pub fn satisfies(role: Role, required: Option<Role>) -> bool {
    match required {
        Some(required) => role >= required,
        None => true,
    }
}

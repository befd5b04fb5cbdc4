//! Open-participation comments ring.
//!
//! A secondary, channel-shaped log scoped to one video channel: any
//! signer may append a comment or reaction before being a registered
//! writer, and the applier auto-admits first-time commenters rather
//! than requiring an owner to add them up front. Moderation
//! (`hide_comment`/`remove_comment`) stays gated by role, re-derived at
//! apply time exactly as `newtube_channel::ChannelApplier` does.

mod applier;
mod ring;
mod view;

pub use applier::CommentsApplier;
pub use ring::{AddCommentOutcome, CommentsRing};
pub use view::{CommentRecord, ReactionRecord, RingView, RingWriterRecord};

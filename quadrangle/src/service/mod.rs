//! Domain services. Each owns one slice of the forum's write path; all of
//! them funnel writes through version-guarded plans so cross-collection
//! updates stay atomic.

pub mod dispatch;
pub mod feedback;
pub mod interaction;
pub mod messaging;
pub mod moderation;
pub mod reconcile;
pub mod relationship;

pub use dispatch::{NotificationDispatcher, NotificationService, derive_notification};
pub use feedback::FeedbackService;
pub use interaction::InteractionService;
pub use messaging::MessagingService;
pub use moderation::ModerationService;
pub use reconcile::ReconcileReport;
pub use relationship::{RelationshipPolicy, RelationshipService, RelationshipState};

//! Business services for the account request workflow.

pub mod confirmation;
pub mod context;
pub mod counts;
pub mod deferred;
pub mod email;
pub mod host;
pub mod review;
pub mod submission;
pub mod throttle;

#[cfg(test)]
pub(crate) mod test_doubles;

pub use confirmation::ConfirmationService;
pub use context::{ActorContext, Capability};
pub use counts::{QueueCounts, RequestCountCache};
pub use deferred::TaskQueue;
pub use email::{NotificationGateway, SmtpGateway};
pub use host::{AccountDirectory, HostHooks};
pub use review::{AcceptRedirect, Decision, ReviewDenial, ReviewOutcome, ReviewService};
pub use submission::{
    AttachmentUpload, SubmissionParams, SubmissionService, SubmitDenial, SubmitOutcome,
};
pub use throttle::SubmissionThrottle;

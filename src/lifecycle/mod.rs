//! Ticket lifecycle engine
//!
//! [`LifecycleController`] implements create, claim, transfer, rename, move,
//! close and participant management on top of the ticket store, the
//! permission synchronizer and the host platform.

mod clock;
mod controller;
mod policy;
mod scheduler;
mod sequence;
mod settings;

pub use clock::{Clock, FixedClock, SystemClock};
pub use controller::{
    CLAIM_BUTTON_ID, CLOSE_CANCEL_ID, CLOSE_CONFIRM_PREFIX, CLOSE_REQUEST_ID, CloseOutcome,
    ClosedTicket, LifecycleController, MOVE_MENU_ID, Outcome, PlatformHandles, close_confirm_id,
    panel_button_id, parse_close_confirm_id, parse_panel_button_id,
};
pub use policy::{Access, AuthorizationPolicy, Operation, POLICY_TABLE, Rule};
pub use scheduler::{ManualScheduler, ScheduledJob, TaskHandle, TaskScheduler, TokioScheduler};
pub use sequence::SequenceAllocator;
pub use settings::{CategoryMap, LifecycleSettings};

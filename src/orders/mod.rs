//! 订单域：下单、状态机、取消审批

pub mod cancellation;
pub mod placement;
pub mod state_machine;

pub use cancellation::{CancelOutcome, CancellationService};
pub use placement::{PlacedOrder, PlacementService};
pub use state_machine::{Actor, OrderLocks, OrderStateMachine};

pub mod allocation_engine;
pub mod cashback_distributor;
pub mod share_rounding;

pub use allocation_engine::{Allocation, allocate};
pub use cashback_distributor::distribute;
pub use share_rounding::{RawShare, reconcile};

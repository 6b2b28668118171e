pub mod action;
mod flows;
pub mod server;
pub mod snapshot;
pub mod stats;

pub use action::{ActionState, ClaimPayload, MapsGuard};
pub use server::{Server, SharedState, TierStates};
pub use snapshot::{DebugSnapshot, FlightPublicInfo, SystemInfo, TierPublicInfo};
pub use stats::{ActionStatistic, EndpointCounters, MapName, MapStat, StatisticSummary};

use std::sync::{Mutex, MutexGuard};

/// Lock with poison recovery: a panicked holder must not wedge the server.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

//! Location provider capability consumed by the tracker.
//!
//! Hosts implement [`LocationProvider`] over the platform location API. The
//! callback passed to [`LocationProvider::watch_position`] may be invoked on
//! any thread and must return quickly; the tracker only forwards the sample
//! over a channel from inside it.

use crate::error::Result;
use crate::Coordinate;

/// Callback invoked by the provider for every new fix.
pub type SampleCallback = Box<dyn Fn(Coordinate) + Send + Sync>;

/// Opaque handle identifying an active position subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// Device location capability.
pub trait LocationProvider: Send + Sync + 'static {
    /// Ask for (or confirm) the location permission. `false` means denied.
    fn request_permission(&self) -> bool;

    /// A single current fix, or `None` when no provider can produce one.
    fn current_position(&self) -> Option<Coordinate>;

    /// Start delivering fixes to `callback` until [`LocationProvider::unwatch`].
    fn watch_position(&self, callback: SampleCallback) -> Result<SubscriptionHandle>;

    /// Stop a subscription. Unknown handles are ignored.
    fn unwatch(&self, handle: SubscriptionHandle);
}

// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for asynchronous, concurrent operations.
//
// Structure:
// - core/           - Health types shared by infrastructure actors
// - infrastructure/ - Concrete infrastructure actors (health monitor)
//
// Note: Order logic lives in the OrderService command handler, NOT in
//       actors. Viewer sessions are actors and live in `notifications`.
//
// ============================================================================

mod core;
mod infrastructure;

pub use self::core::{ComponentHealth, HealthStatus};
pub use self::infrastructure::{
    GetSystemHealth, HealthMonitorActor, SystemHealth, UpdateHealth, BROADCASTER, ORDER_STORE,
};

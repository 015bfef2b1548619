// ============================================================================
// order_relay - order lifecycle engine with real-time fan-out
// ============================================================================
//
// Control flow:
//   request → OrderService → OrderStore (status + audit entry, atomically)
//           → Broadcaster → subscribers (SSE clients, ViewerSession actors)
//
// ============================================================================

pub mod actors;
pub mod api;
pub mod broadcast;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod notifications;
pub mod store;
pub mod utils;

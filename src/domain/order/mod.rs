// ============================================================================
// Order Domain - lifecycle state machine and audit trail
// ============================================================================
//
// - Value objects (OrderStatus, OrderCode, LineItem, Operator)
// - Commands (PlaceOrder, AdvanceStatus)
// - Audit trail (TransitionRecord, AuditTrail)
// - Aggregate (OrderSnapshot pricing and transition planning)
// - Events (what the broadcaster fans out)
// - Command handler (OrderService, the transition engine)
//
// ============================================================================

pub mod value_objects;
pub mod events;
pub mod commands;
pub mod errors;
pub mod history;
pub mod aggregate;
pub mod command_handler;

pub use value_objects::*;
pub use events::*;
pub use commands::*;
pub use errors::*;
pub use history::*;
pub use aggregate::*;
pub use command_handler::*;

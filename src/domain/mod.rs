// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Order lifecycle rules and the catalog lookup they depend on. Storage and
// transport live outside this module.
//
// ============================================================================

pub mod catalog;
pub mod order;

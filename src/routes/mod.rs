/// Router Module Index
///
/// Organizes the routing into access-segregated modules. Access control is applied
/// at the module level through layers in [`crate::create_router`], and every
/// handler additionally asks [`crate::guard`] about the action it performs.

/// Routes open to anonymous callers (reads, registration, newsletter).
pub mod public;

/// Routes requiring a valid session token.
pub mod authenticated;

/// Routes restricted to the `admin` role. Nested under `/api/admin`.
pub mod admin;

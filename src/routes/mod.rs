/// Router Module Index
///
/// Organizes the routing logic into security-segregated modules. Access
/// control is applied explicitly at the module level via Axum route layers,
/// so a handler can never be exposed with the wrong gate by accident.
///
/// The permission table below is the single source of truth the
/// authorization guards consult; handlers contain no role checks of their
/// own.

/// Role set for routes any authenticated caller may use.
pub const ANY_ROLE: &[&str] = &["admin", "user"];

/// Role set for routes restricted to administrators.
pub const ADMIN_ONLY: &[&str] = &["admin"];

/// Routes accessible to all clients (anonymous, read-only, plus the auth
/// gateway endpoints).
pub mod public;

/// Routes requiring a validated session of any role.
pub mod authenticated;

/// Routes restricted to the 'admin' role.
pub mod admin;

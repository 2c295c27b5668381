/// Router Module Index
///
/// Routing split by access level. Access control is applied per module via
/// Axum layers, so a route cannot end up public by accident.

/// Anonymous reads (public listing scope).
pub mod public;

/// Submissions, edits and review listings. Requires a validated caller.
pub mod authenticated;

/// Moderation: approve, reject, delete.
pub mod admin;

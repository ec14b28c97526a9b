//! Data records returned by the checks

/// Structured verification reports and their text rendering.
pub mod report;

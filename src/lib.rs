//! Purpose: Stream typed record sequences to database clients as forward-only row sources.
//! Exports: `api` (projection specs, cursors, pull sources, client boundary, bulk load).
//! Role: Library backing table-valued parameter binding and bulk-load ingestion.
//! Invariants: `api` is the only public path; engine modules stay private.
//! Invariants: Row sources never buffer more than one upstream item ahead.
pub mod api;
mod core;

// Geographic primitives and coordinate precision
pub mod geo;

// Deadline-bounded HTTP fetch
pub mod fetch;

// Feed data model and parsers
pub mod feed;

// Live entity reconciliation
pub mod reconcile;

// Static transit data and departure boards
pub mod transit;

// Shareable-URL view state
pub mod urlstate;

// Configuration
pub mod config;

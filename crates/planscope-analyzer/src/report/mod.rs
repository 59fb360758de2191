//! Report Module
//!
//! Renders analyzed plans and summaries, together with their assessment,
//! into a fixed-layout plain-text report suitable for logs and consoles.

mod formatter;

pub use formatter::*;

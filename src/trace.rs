// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracing sink for `pgread`/`pgwrite`, replacing the source's
//! `#ifdef IODUMP` / `#ifdef MEMPHYS_DUMP` with a runtime handle. Mirrors
//! the shape of the teacher's `klog!` macro in `debug/mod.rs`, which
//! prefixes every line with `file!()`/`line!()` and is itself feature-gated;
//! here the gate is [`crate::config::TraceConfig`] carried on the [`Tracer`]
//! rather than a Cargo feature.

use crate::config::TraceConfig;

/// Owns the trace configuration and is the single place `pgread`/`pgwrite`
/// and the paging engine go to decide whether (and how much) to print.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tracer {
    config: TraceConfig,
}

impl Tracer {
    pub fn new(config: TraceConfig) -> Self {
        Tracer { config }
    }

    pub fn silent() -> Self {
        Tracer { config: TraceConfig::silent() }
    }

    pub fn iodump_enabled(&self) -> bool {
        self.config.iodump
    }

    pub fn dump_memphy_enabled(&self) -> bool {
        self.config.dump_memphy
    }
}

/// Emits a line through a [`Tracer`] if `IODUMP`-equivalent tracing is on.
/// Always prefixes the call site, matching the teacher's `klog!` macro.
#[macro_export]
macro_rules! klog_trace {
    ($tracer:expr, $($args:tt)+) => {{
        if $tracer.iodump_enabled() {
            println!(" [{}:{}] {}", file!(), line!(), format_args!($($args)+));
        }
    }};
}

/// Emits a line unconditionally. Used for logic errors (double-free,
/// unmapped access, and similar) that are logged and returned as a
/// failure rather than panicking.
#[macro_export]
macro_rules! klog_info {
    ($($args:tt)+) => {{
        println!(" [{}:{}] {}", file!(), line!(), format_args!($($args)+));
    }};
}

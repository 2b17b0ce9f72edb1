//! Memory budgeting.
//!
//! Provides system memory detection, working-set estimates, and environment
//! variable overrides.
//!
//! # Environment Variables
//!
//! - `LSDECON_MEM_MB` - Explicit memory budget in megabytes
//! - `LSDECON_BACKEND` - Backend override (`auto`, `cpu`, `gpu`)

use lsdecon_core::Extents;
use std::env;
use std::sync::OnceLock;

/// Default safety margin - use at most 80% of system memory.
pub const SAFE_MEMORY_FRACTION: f64 = 0.80;

/// Bytes per real sample.
const REAL_BYTES: u64 = 4;
/// Bytes per complex sample.
const COMPLEX_BYTES: u64 = 8;

/// Cache for system memory detection.
static SYSTEM_MEMORY: OnceLock<u64> = OnceLock::new();

/// Detect total system RAM in bytes.
pub fn system_memory() -> u64 {
    *SYSTEM_MEMORY.get_or_init(|| {
        sys_info::mem_info()
            .map(|m| m.total * 1024) // KB to bytes
            .unwrap_or(8 * 1024 * 1024 * 1024) // 8 GB fallback
    })
}

/// Memory budget in bytes.
///
/// `LSDECON_MEM_MB` wins; otherwise 80% of system RAM.
pub fn available_memory() -> u64 {
    if let Some(mb) = env_mem_mb() {
        return mb * 1024 * 1024;
    }
    (system_memory() as f64 * SAFE_MEMORY_FRACTION) as u64
}

/// Get backend override from environment.
pub fn backend_override() -> Option<String> {
    env::var("LSDECON_BACKEND").ok().filter(|v| !v.trim().is_empty())
}

fn env_mem_mb() -> Option<u64> {
    env::var("LSDECON_MEM_MB")
        .ok()
        .and_then(|v| v.trim().parse().ok())
}

/// Estimated peak bytes for restoring one volume of `working` extents.
///
/// One-shot: the volume, its half spectrum and the Z-pass transpose buffer.
/// Iterative adds the observed copy, the ratio buffer and the resampled OTF.
pub fn working_set(working: Extents, iterative: bool) -> u64 {
    let real = working.len() as u64 * REAL_BYTES;
    let half = working.half_spectrum().len() as u64 * COMPLEX_BYTES;
    let one_shot = real + 2 * half;
    if iterative {
        one_shot + 2 * real + half
    } else {
        one_shot
    }
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

//! Quarry Utils - Utility Functions
//!
//! Lock-stripe hashing, log checksums and byte-size rendering for log lines.
//!
//! @version 0.1.0
//! @author Quarry Development Team

use xxhash_rust::xxh3::xxh3_64;

// =============================================================================
// Hashing Functions
// =============================================================================

/// Map a key onto one of `stripes` buckets by its xxHash3 hash.
#[inline]
pub fn stripe_for(key: &[u8], stripes: usize) -> usize {
    (xxh3_64(key) % stripes.max(1) as u64) as usize
}

// =============================================================================
// Checksum Functions
// =============================================================================

/// Compute CRC32 checksum for data integrity verification.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Verify data against expected CRC32 checksum.
#[inline]
pub fn verify_crc32(data: &[u8], expected: u32) -> bool {
    crc32(data) == expected
}

// =============================================================================
// Size Formatting
// =============================================================================

const SIZE_UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

/// Render a byte count for log lines: exact below 1 KiB, two decimals above.
pub fn format_size(bytes: u64) -> String {
    let mut scaled = bytes as f64;
    let mut unit = None;
    for next in SIZE_UNITS {
        if scaled < 1024.0 {
            break;
        }
        scaled /= 1024.0;
        unit = Some(next);
    }

    match unit {
        Some(unit) => format!("{:.2} {}", scaled, unit),
        None => format!("{} B", bytes),
    }
}

// =============================================================================
// Tests
// =============================================================================

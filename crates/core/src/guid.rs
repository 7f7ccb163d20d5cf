// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic GUID generation for orchestrations.
//!
//! Orchestrator code must produce identical GUIDs on every replay, so
//! GUIDs are derived from replay-stable inputs: the instance id, the
//! cursor's current deterministic time, and a per-turn counter.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Fixed namespace for orchestration GUIDs. The value itself is arbitrary
/// but must never change: it is part of the derivation.
pub const GUID_NAMESPACE: Uuid = Uuid::from_u128(0x9e95_2958_5e33_4daf_827f_2fa1_2937_b875);

/// Derive a GUID from replay-stable inputs.
///
/// SHA-1 name-based UUID (RFC 4122 version 5) over
/// `instance_id "_" RFC3339-time "_" counter` under [`GUID_NAMESPACE`],
/// with the first three fields byte-swapped into the little-endian
/// `System.Guid` layout, so replays on any runtime produce identical ids.
pub fn deterministic_guid(instance_id: &str, current_time: DateTime<Utc>, counter: u32) -> Uuid {
    let name = format!(
        "{}_{}_{}",
        instance_id,
        current_time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        counter
    );
    let hashed = Uuid::new_v5(&GUID_NAMESPACE, name.as_bytes());
    let b = hashed.into_bytes();
    // Data1 (4 bytes), Data2 (2), Data3 (2) are little-endian in the Guid
    // layout; the remaining 8 bytes are unswapped.
    Uuid::from_bytes([
        b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9], b[10], b[11], b[12], b[13],
        b[14], b[15],
    ])
}

#[cfg(test)]
#[path = "guid_tests.rs"]
mod tests;

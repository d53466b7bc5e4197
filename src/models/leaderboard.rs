// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Group/record join entries.

use serde::{Deserialize, Serialize};

/// Ranking assigned to a fresh participation. Ranking is not computed yet.
pub const INITIAL_RANKING: i64 = 0;

/// Links one participation (a record) to the group it belongs to.
///
/// Exactly one entry exists per (group, record) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderBoardEntry {
    pub entry_id: u64,
    pub group_id: u64,
    pub record_id: u64,
    pub ranking: i64,
}

impl LeaderBoardEntry {
    /// Document ID derived from the (group, record) pair.
    pub fn doc_id(group_id: u64, record_id: u64) -> String {
        format!("{}_{}", group_id, record_id)
    }
}

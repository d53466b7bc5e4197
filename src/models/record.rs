// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Exercise record created for each participation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Stored exercise record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record ID (also used as document ID)
    pub record_id: u64,
    /// Owning user
    pub user_id: u64,
    /// Day the run started
    pub running_start_date: NaiveDate,
    /// Elapsed running time in seconds
    pub running_time_secs: u64,
    /// Distance in meters
    pub distance_meters: u64,
    pub calories: u64,
}

/// A record that has not been assigned an ID yet.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub user_id: u64,
    pub running_start_date: NaiveDate,
}

impl NewRecord {
    /// A zeroed record for a user joining a group on `date`.
    pub fn starting(user_id: u64, date: NaiveDate) -> Self {
        Self {
            user_id,
            running_start_date: date,
        }
    }

    pub fn with_id(self, record_id: u64) -> Record {
        Record {
            record_id,
            user_id: self.user_id,
            running_start_date: self.running_start_date,
            running_time_secs: 0,
            distance_meters: 0,
            calories: 0,
        }
    }
}

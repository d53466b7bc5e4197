// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Running group model and its API views.

use crate::time_utils::rfc3339_fixed;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Number of groups shown on the landing page.
pub const MAIN_PAGE_LIMIT: usize = 6;

/// Group category. `Quick` is reserved for the daily auto-generated group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum GroupTag {
    Beginner,
    Intermediate,
    Advanced,
    Marathon,
    Trail,
    Quick,
}

impl GroupTag {
    /// Stored representation, identical to the serde name.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupTag::Beginner => "BEGINNER",
            GroupTag::Intermediate => "INTERMEDIATE",
            GroupTag::Advanced => "ADVANCED",
            GroupTag::Marathon => "MARATHON",
            GroupTag::Trail => "TRAIL",
            GroupTag::Quick => "QUICK",
        }
    }
}

/// Stored running group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningGroup {
    /// Group ID (also used as document ID)
    pub group_id: u64,
    pub title: String,
    pub tag: GroupTag,
    #[serde(with = "rfc3339_fixed")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "rfc3339_fixed")]
    pub end_time: DateTime<Utc>,
    /// Target distance in meters
    pub target_distance: i64,
    pub max_participants: u32,
    pub current_participants: u32,
    pub active: bool,
}

impl RunningGroup {
    /// Take one seat. Returns `false` (and changes nothing) when the group is full.
    pub fn try_join(&mut self) -> bool {
        if self.current_participants >= self.max_participants {
            return false;
        }
        self.current_participants += 1;
        true
    }

    /// Release one seat. Returns `false` (and changes nothing) when nobody is in the group.
    pub fn try_leave(&mut self) -> bool {
        if self.current_participants == 0 {
            return false;
        }
        self.current_participants -= 1;
        true
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.start_time > now
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_time <= now
    }

    /// Search predicate: upcoming, title contains `search_word` (case-sensitive),
    /// and tag equal to `tag` when one is given.
    pub fn matches_filter(
        &self,
        now: DateTime<Utc>,
        tag: Option<GroupTag>,
        search_word: &str,
    ) -> bool {
        self.is_upcoming(now)
            && tag.map_or(true, |t| self.tag == t)
            && self.title.contains(search_word)
    }
}

/// A group that has not been assigned an ID yet.
#[derive(Debug, Clone)]
pub struct NewRunningGroup {
    pub title: String,
    pub tag: GroupTag,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub target_distance: i64,
    pub max_participants: u32,
}

impl NewRunningGroup {
    /// Materialize with a store-assigned ID: no participants, active.
    pub fn with_id(self, group_id: u64) -> RunningGroup {
        RunningGroup {
            group_id,
            title: self.title,
            tag: self.tag,
            start_time: self.start_time,
            end_time: self.end_time,
            target_distance: self.target_distance,
            max_participants: self.max_participants,
            current_participants: 0,
            active: true,
        }
    }
}

// ─── Requests ────────────────────────────────────────────────

/// Create-group request body.
///
/// Counts arrive signed so that negative values are rejected as invalid
/// arguments instead of failing deserialization.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "title must be 1-100 characters"))]
    pub title: String,
    pub tag: GroupTag,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(range(min = 0, message = "target distance must not be negative"))]
    pub target_distance: i64,
    /// Upper bound (`u32::MAX`) is enforced when the request is converted.
    #[validate(range(min = 1, message = "max participants must be at least 1"))]
    pub max_participants: i64,
}

/// Cancel-participation request body.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CancelParticipationRequest {
    pub group_id: u64,
    pub record_id: u64,
}

// ─── Responses ───────────────────────────────────────────────

/// Group listing entry.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GroupSummary {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub group_id: u64,
    pub title: String,
    pub tag: GroupTag,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub target_distance: i64,
    pub max_participants: u32,
    pub current_participants: u32,
    pub active: bool,
}

impl From<RunningGroup> for GroupSummary {
    fn from(g: RunningGroup) -> Self {
        Self {
            group_id: g.group_id,
            title: g.title,
            tag: g.tag,
            start_time: g.start_time,
            end_time: g.end_time,
            target_distance: g.target_distance,
            max_participants: g.max_participants,
            current_participants: g.current_participants,
            active: g.active,
        }
    }
}

/// Compact card for the landing page.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MainPageGroup {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub group_id: u64,
    pub title: String,
    pub tag: GroupTag,
    pub start_time: DateTime<Utc>,
    pub current_participants: u32,
    pub max_participants: u32,
}

impl From<RunningGroup> for MainPageGroup {
    fn from(g: RunningGroup) -> Self {
        Self {
            group_id: g.group_id,
            title: g.title,
            tag: g.tag,
            start_time: g.start_time,
            current_participants: g.current_participants,
            max_participants: g.max_participants,
        }
    }
}

/// Group details with participant nicknames.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GroupParticipants {
    pub title: String,
    pub tag: GroupTag,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub target_distance: i64,
    pub max_participants: u32,
    pub current_participants: u32,
    pub participants: Vec<String>,
}

/// Result of joining a group: the freshly created record.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ParticipationResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub record_id: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub group_id: u64,
    pub running_start_date: NaiveDate,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub running_time_secs: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub distance_meters: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub calories: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn make_group(max: u32, current: u32) -> RunningGroup {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap();
        RunningGroup {
            group_id: 1,
            title: "Morning 5K".to_string(),
            tag: GroupTag::Beginner,
            start_time: start,
            end_time: start + Duration::hours(1),
            target_distance: 5000,
            max_participants: max,
            current_participants: current,
            active: true,
        }
    }

    #[test]
    fn test_try_join_stops_at_capacity() {
        let mut group = make_group(2, 1);

        assert!(group.try_join());
        assert_eq!(group.current_participants, 2);

        assert!(!group.try_join());
        assert_eq!(group.current_participants, 2);
    }

    #[test]
    fn test_try_leave_stops_at_zero() {
        let mut group = make_group(2, 1);

        assert!(group.try_leave());
        assert!(!group.try_leave());
        assert_eq!(group.current_participants, 0);
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let mut group = make_group(2, 0);
        group.deactivate();
        let once = group.clone();
        group.deactivate();
        assert_eq!(group, once);
        assert!(!group.active);
    }

    #[test]
    fn test_matches_filter() {
        let group = make_group(10, 0);
        let before = group.start_time - Duration::minutes(1);

        assert!(group.matches_filter(before, None, "5K"));
        assert!(group.matches_filter(before, Some(GroupTag::Beginner), ""));
        assert!(!group.matches_filter(before, Some(GroupTag::Trail), "5K"));
        // Case-sensitive substring
        assert!(!group.matches_filter(before, None, "5k"));
        // Starting exactly now is not upcoming
        assert!(!group.matches_filter(group.start_time, None, "5K"));
    }

    #[test]
    fn test_tag_serde_name_matches_as_str() {
        for tag in [
            GroupTag::Beginner,
            GroupTag::Intermediate,
            GroupTag::Advanced,
            GroupTag::Marathon,
            GroupTag::Trail,
            GroupTag::Quick,
        ] {
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{}\"", tag.as_str()));
        }
    }
}

//! Date-propagation scheduler.
//!
//! Turns an unordered skeleton (WBS entries, activities, predecessor codes)
//! into a fully dated, id-resolved [`Schedule`]. The skeleton usually comes
//! from the chat collaborator as JSON, with human-chosen codes and no
//! durable identity; this pass assigns fresh ids and computes every date in
//! one deterministic forward sweep.
//!
//! The pass never fails. Input lists are expected parent-first and
//! dependency-ordered; references that do not resolve at the point they are
//! needed degrade silently (root attachment, project-start date, an edge
//! kept by code instead of id) and are logged at warn. Callers that want
//! the ordering contract checked run [`validate`] first.

pub mod validate;

pub use validate::{validate, SkeletonIssue};

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::WorkCalendar;
use crate::clog_warn;
use crate::error::Result;
use crate::model::{
    Activity, ActivityId, ActivityKind, ActivityRef, Predecessor, RelationType, Schedule, WbsId,
    WbsNode,
};

/// An undated schedule skeleton, keyed entirely by human-chosen codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skeleton {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Project start date; no activity starts earlier.
    pub start: NaiveDate,
    #[serde(default)]
    pub wbs: Vec<SkeletonWbs>,
    #[serde(default)]
    pub activities: Vec<SkeletonActivity>,
}

/// A WBS entry of a skeleton. Entries must be listed parent-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkeletonWbs {
    pub code: String,
    pub name: String,
    /// Depth in the hierarchy, root = 1.
    pub level: u32,
    #[serde(default)]
    pub parent_code: Option<String>,
}

/// An activity entry of a skeleton. Entries must be listed in dependency
/// order for predecessor dates to constrain successors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkeletonActivity {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub wbs_code: Option<String>,
    /// Duration in whole days; 0 for milestones.
    #[serde(default)]
    pub duration_days: u32,
    #[serde(default)]
    pub kind: ActivityKind,
    /// Codes of predecessor activities (finish-to-start, no lag).
    #[serde(default)]
    pub predecessors: Vec<String>,
}

impl Skeleton {
    /// Deserialize the chat collaborator's JSON payload.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Compute a fully dated schedule from a skeleton in a single pass.
///
/// Guarantees: every activity receives a start and an end date; milestones
/// have start == end and duration 0; an activity with no resolvable
/// predecessors starts at the project start date.
pub fn generate(skeleton: &Skeleton, calendar: &dyn WorkCalendar) -> Schedule {
    let mut schedule = Schedule::new(&skeleton.name);
    schedule.description = skeleton.description.clone();
    schedule.start = Some(skeleton.start);

    // WBS pass: fresh ids, parents resolved through codes seen so far.
    let mut wbs_by_code: HashMap<String, WbsId> = HashMap::new();
    for (index, entry) in skeleton.wbs.iter().enumerate() {
        let parent = match &entry.parent_code {
            None => None,
            Some(code) => match wbs_by_code.get(code) {
                Some(&id) => Some(id),
                None => {
                    clog_warn!(
                        "wbs entry {} references unresolved parent {}, attaching to root",
                        entry.code,
                        code
                    );
                    None
                }
            },
        };
        let id = WbsId::new();
        wbs_by_code.insert(entry.code.clone(), id);
        schedule.wbs.push(WbsNode {
            id,
            parent,
            code: entry.code.clone(),
            name: entry.name.clone(),
            level: entry.level,
            sort_order: index as i32,
        });
    }

    // Activity pass: fresh ids, forward date propagation through the
    // running date table. Predecessors not yet in the table do not
    // constrain the date; their edges survive as code references.
    let mut ids_by_code: HashMap<String, ActivityId> = HashMap::new();
    let mut dates_by_code: HashMap<String, (NaiveDate, NaiveDate)> = HashMap::new();
    let mut schedule_end = skeleton.start;

    for entry in &skeleton.activities {
        let id = ActivityId::new();
        let wbs = match &entry.wbs_code {
            None => None,
            Some(code) => match wbs_by_code.get(code) {
                Some(&wbs_id) => Some(wbs_id),
                None => {
                    clog_warn!(
                        "activity {} references unresolved wbs {}, leaving unassigned",
                        entry.code,
                        code
                    );
                    None
                }
            },
        };

        let mut duration_days = entry.duration_days;
        if entry.kind == ActivityKind::Milestone && duration_days != 0 {
            clog_warn!(
                "activity {} is a milestone with nonzero duration, clamping to 0",
                entry.code
            );
            duration_days = 0;
        }

        let mut start = skeleton.start;
        let mut predecessors = Vec::new();
        for code in &entry.predecessors {
            match (dates_by_code.get(code), ids_by_code.get(code)) {
                (Some(&(_, pred_end)), Some(&pred_id)) => {
                    // Lag is calendar arithmetic: the day after the
                    // predecessor finishes, weekend or not.
                    let candidate = pred_end + Duration::days(1);
                    if candidate > start {
                        start = candidate;
                    }
                    predecessors.push(Predecessor {
                        target: ActivityRef::Id(pred_id),
                        relation: RelationType::FinishToStart,
                        lag_days: 0,
                    });
                }
                _ => {
                    clog_warn!(
                        "activity {} references predecessor {} before it is dated, ignoring for dates",
                        entry.code,
                        code
                    );
                    predecessors.push(Predecessor {
                        target: ActivityRef::Code(code.clone()),
                        relation: RelationType::FinishToStart,
                        lag_days: 0,
                    });
                }
            }
        }

        let end = if duration_days == 0 {
            start
        } else {
            calendar.add_work_days(start, duration_days as i64)
        };
        dates_by_code.insert(entry.code.clone(), (start, end));
        ids_by_code.insert(entry.code.clone(), id);
        if end > schedule_end {
            schedule_end = end;
        }

        schedule.activities.push(Activity {
            id,
            wbs,
            code: entry.code.clone(),
            name: entry.name.clone(),
            description: None,
            duration_days: duration_days as f64,
            start: Some(start),
            end: Some(end),
            kind: entry.kind,
            predecessors,
            resources: Vec::new(),
        });
    }

    schedule.end = Some(schedule_end);
    schedule
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::WeekdayCalendar;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn skeleton() -> Skeleton {
        Skeleton {
            name: "Rollout".to_string(),
            description: None,
            start: date(2024, 3, 1),
            wbs: vec![SkeletonWbs {
                code: "1".to_string(),
                name: "Phase 1".to_string(),
                level: 1,
                parent_code: None,
            }],
            activities: vec![
                SkeletonActivity {
                    code: "A".to_string(),
                    name: "Kickoff".to_string(),
                    wbs_code: Some("1".to_string()),
                    duration_days: 0,
                    kind: ActivityKind::Milestone,
                    predecessors: Vec::new(),
                },
                SkeletonActivity {
                    code: "B".to_string(),
                    name: "Build".to_string(),
                    wbs_code: Some("1".to_string()),
                    duration_days: 5,
                    kind: ActivityKind::Task,
                    predecessors: vec!["A".to_string()],
                },
            ],
        }
    }

    #[test]
    fn test_friday_milestone_scenario() {
        // 2024-03-01 is a Friday.
        let schedule = generate(&skeleton(), &WeekdayCalendar);

        let a = schedule.activity_by_code("A").unwrap();
        assert_eq!(a.start, Some(date(2024, 3, 1)));
        assert_eq!(a.end, Some(date(2024, 3, 1)));

        // The successor starts the next calendar day (a Saturday; lag does
        // not skip weekends), and five work days end on the second Friday.
        let b = schedule.activity_by_code("B").unwrap();
        assert_eq!(b.start, Some(date(2024, 3, 2)));
        assert_eq!(b.end, Some(date(2024, 3, 8)));

        assert_eq!(schedule.start, Some(date(2024, 3, 1)));
        assert_eq!(schedule.end, Some(date(2024, 3, 8)));
    }

    #[test]
    fn test_predecessor_edges_resolve_to_ids() {
        let schedule = generate(&skeleton(), &WeekdayCalendar);
        let a = schedule.activity_by_code("A").unwrap();
        let b = schedule.activity_by_code("B").unwrap();
        assert_eq!(b.predecessors[0].target, ActivityRef::Id(a.id));
    }

    #[test]
    fn test_out_of_order_predecessor_degrades() {
        let mut skel = skeleton();
        skel.activities.reverse();
        let schedule = generate(&skel, &WeekdayCalendar);

        // B is processed first: its predecessor A is not yet dated, so B
        // starts at the project start and the edge survives as a code ref.
        let b = schedule.activity_by_code("B").unwrap();
        assert_eq!(b.start, Some(date(2024, 3, 1)));
        assert_eq!(
            b.predecessors[0].target,
            ActivityRef::Code("A".to_string())
        );
    }

    #[test]
    fn test_dangling_wbs_code_degrades() {
        let mut skel = skeleton();
        skel.activities[0].wbs_code = Some("GHOST".to_string());
        let schedule = generate(&skel, &WeekdayCalendar);
        assert_eq!(schedule.activity_by_code("A").unwrap().wbs, None);
    }

    #[test]
    fn test_milestone_duration_clamped() {
        let mut skel = skeleton();
        skel.activities[0].duration_days = 3;
        let schedule = generate(&skel, &WeekdayCalendar);
        let a = schedule.activity_by_code("A").unwrap();
        assert_eq!(a.duration_days, 0.0);
        assert_eq!(a.start, a.end);
    }

    #[test]
    fn test_unresolved_wbs_parent_attaches_to_root() {
        let mut skel = skeleton();
        skel.wbs.push(SkeletonWbs {
            code: "2".to_string(),
            name: "Orphan".to_string(),
            level: 2,
            parent_code: Some("MISSING".to_string()),
        });
        let schedule = generate(&skel, &WeekdayCalendar);
        assert_eq!(schedule.wbs[1].parent, None);
    }

    #[test]
    fn test_every_activity_is_dated() {
        let mut skel = skeleton();
        skel.activities.push(SkeletonActivity {
            code: "C".to_string(),
            name: "Wrap up".to_string(),
            wbs_code: None,
            duration_days: 2,
            kind: ActivityKind::Task,
            predecessors: vec!["B".to_string(), "GHOST".to_string()],
        });
        let schedule = generate(&skel, &WeekdayCalendar);
        for activity in &schedule.activities {
            assert!(activity.start.is_some());
            assert!(activity.end.is_some());
            assert!(activity.start >= schedule.start);
        }
        // C follows B despite the dangling extra predecessor.
        let b = schedule.activity_by_code("B").unwrap();
        let c = schedule.activity_by_code("C").unwrap();
        assert!(c.start > b.end);
    }

    #[test]
    fn test_from_json_camel_case() {
        let json = r#"{
            "name": "Rollout",
            "start": "2024-03-01",
            "wbs": [{"code": "1", "name": "Phase 1", "level": 1}],
            "activities": [
                {"code": "A", "name": "Kickoff", "wbsCode": "1", "kind": "milestone"},
                {"code": "B", "name": "Build", "wbsCode": "1", "durationDays": 5, "predecessors": ["A"]}
            ]
        }"#;
        let skel = Skeleton::from_json(json).unwrap();
        assert_eq!(skel.activities.len(), 2);
        assert_eq!(skel.activities[0].kind, ActivityKind::Milestone);
        assert_eq!(skel.activities[1].duration_days, 5);

        let schedule = generate(&skel, &WeekdayCalendar);
        assert_eq!(
            schedule.activity_by_code("B").unwrap().end,
            Some(date(2024, 3, 8))
        );
    }
}

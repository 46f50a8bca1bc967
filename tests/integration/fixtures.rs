//! Shared fixtures for integration tests.
//!
//! Provides a representative schedule (hierarchy, dependency chain,
//! milestone, resources), a matching skeleton, and a file header.

use chrono::NaiveDate;

use cadence::codec::FileHeader;
use cadence::config::ExportConfig;
use cadence::model::{
    Activity, ActivityId, ActivityKind, ActivityRef, Predecessor, RelationType, Resource,
    ResourceAssignment, Schedule, WbsId, WbsNode,
};
use cadence::scheduler::{Skeleton, SkeletonActivity, SkeletonWbs};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn header() -> FileHeader {
    FileHeader::new(
        &ExportConfig::default(),
        date(2024, 3, 1),
        "Rollout",
        "Acme Corp",
    )
}

fn activity(code: &str, name: &str, days: f64, kind: ActivityKind) -> Activity {
    Activity {
        id: ActivityId::new(),
        wbs: None,
        code: code.to_string(),
        name: name.to_string(),
        description: None,
        duration_days: days,
        start: None,
        end: None,
        kind,
        predecessors: Vec::new(),
        resources: Vec::new(),
    }
}

fn resource(code: &str, name: &str) -> Resource {
    Resource {
        id: None,
        code: code.to_string(),
        name: name.to_string(),
    }
}

/// A schedule with two WBS levels, a milestone, a dependency chain with
/// lag, and two resources sharing one activity.
pub fn sample_schedule() -> Schedule {
    let mut schedule = Schedule::new("Rollout");
    schedule.start = Some(date(2024, 3, 1));
    schedule.end = Some(date(2024, 4, 1));

    let phase = WbsNode {
        id: WbsId::new(),
        parent: None,
        code: "1".to_string(),
        name: "Phase 1".to_string(),
        level: 1,
        sort_order: 0,
    };
    let design = WbsNode {
        id: WbsId::new(),
        parent: Some(phase.id),
        code: "1.1".to_string(),
        name: "Design".to_string(),
        level: 2,
        sort_order: 1,
    };

    let mut kickoff = activity("A", "Kickoff", 0.0, ActivityKind::Milestone);
    kickoff.wbs = Some(phase.id);
    kickoff.start = Some(date(2024, 3, 1));
    kickoff.end = Some(date(2024, 3, 1));

    let mut build = activity("B", "Build", 5.0, ActivityKind::Task);
    build.wbs = Some(design.id);
    build.predecessors.push(Predecessor {
        target: ActivityRef::Id(kickoff.id),
        relation: RelationType::FinishToStart,
        lag_days: 0,
    });
    build.resources.push(ResourceAssignment {
        resource: resource("ENG", "Engineering"),
        units: 2.0,
    });

    let mut verify = activity("C", "Verify", 3.0, ActivityKind::Task);
    verify.wbs = Some(design.id);
    verify.predecessors.push(Predecessor {
        target: ActivityRef::Id(build.id),
        relation: RelationType::FinishToStart,
        lag_days: 2,
    });
    verify.resources.push(ResourceAssignment {
        resource: resource("ENG", "Engineering"),
        units: 1.0,
    });
    verify.resources.push(ResourceAssignment {
        resource: resource("QA", "Quality"),
        units: 1.5,
    });

    schedule.wbs = vec![phase, design];
    schedule.activities = vec![kickoff, build, verify];
    schedule
}

/// The skeleton equivalent of [`sample_schedule`], keyed by codes only.
pub fn sample_skeleton() -> Skeleton {
    Skeleton {
        name: "Rollout".to_string(),
        description: Some("Generated from requirements".to_string()),
        start: date(2024, 3, 1),
        wbs: vec![
            SkeletonWbs {
                code: "1".to_string(),
                name: "Phase 1".to_string(),
                level: 1,
                parent_code: None,
            },
            SkeletonWbs {
                code: "1.1".to_string(),
                name: "Design".to_string(),
                level: 2,
                parent_code: Some("1".to_string()),
            },
        ],
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
                wbs_code: Some("1.1".to_string()),
                duration_days: 5,
                kind: ActivityKind::Task,
                predecessors: vec!["A".to_string()],
            },
            SkeletonActivity {
                code: "C".to_string(),
                name: "Verify".to_string(),
                wbs_code: Some("1.1".to_string()),
                duration_days: 3,
                kind: ActivityKind::Task,
                predecessors: vec!["B".to_string()],
            },
        ],
    }
}

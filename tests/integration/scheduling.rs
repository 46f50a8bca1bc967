//! Date propagation, degradation behavior, and the full pipeline from
//! skeleton to persisted-and-regenerated interchange file.

use cadence::calendar::{WeekdayCalendar, WorkCalendar};
use cadence::codec::tabular;
use cadence::model::{ActivityId, ActivityRef, IdRemap, ScheduleId, WbsId};
use cadence::scheduler::{self, SkeletonIssue};

use crate::fixtures::{date, header, sample_skeleton};

#[test]
fn friday_start_scenario() {
    // Project starts Friday 2024-03-01. The milestone pins that day; the
    // successor starts Saturday (predecessor lag is calendar arithmetic)
    // and five work days land on the second Friday.
    let schedule = scheduler::generate(&sample_skeleton(), &WeekdayCalendar);

    let a = schedule.activity_by_code("A").unwrap();
    assert_eq!(a.start, Some(date(2024, 3, 1)));
    assert_eq!(a.end, Some(date(2024, 3, 1)));

    let b = schedule.activity_by_code("B").unwrap();
    assert_eq!(b.start, Some(date(2024, 3, 2)));
    assert_eq!(b.end, Some(date(2024, 3, 8)));

    let c = schedule.activity_by_code("C").unwrap();
    assert_eq!(c.start, Some(date(2024, 3, 9)));
    assert_eq!(c.end, Some(date(2024, 3, 13)));

    assert_eq!(schedule.end, c.end);
}

#[test]
fn ends_never_land_on_weekends_for_tasks() {
    let schedule = scheduler::generate(&sample_skeleton(), &WeekdayCalendar);
    let cal = WeekdayCalendar;
    for activity in schedule.activities.iter().filter(|a| a.duration_days > 0.0) {
        assert!(cal.is_work_day(activity.end.unwrap()));
    }
}

#[test]
fn clean_skeleton_validates_clean() {
    assert!(scheduler::validate(&sample_skeleton()).is_empty());
}

#[test]
fn validation_reports_what_dating_degrades_on() {
    let mut skel = sample_skeleton();
    skel.activities.swap(1, 2); // C now precedes its predecessor B

    let issues = scheduler::validate(&skel);
    assert!(issues.contains(&SkeletonIssue::PredecessorListedLater {
        code: "C".to_string(),
        predecessor: "B".to_string(),
    }));

    // Dating still succeeds, with C anchored to the project start and the
    // unresolved edge kept as a code reference.
    let schedule = scheduler::generate(&skel, &WeekdayCalendar);
    let c = schedule.activity_by_code("C").unwrap();
    assert_eq!(c.start, Some(date(2024, 3, 1)));
    assert_eq!(
        c.predecessors[0].target,
        ActivityRef::Code("B".to_string())
    );
}

#[test]
fn skeleton_to_file_pipeline() {
    // Skeleton -> dated schedule -> durable ids -> interchange file.
    let schedule = scheduler::generate(&sample_skeleton(), &WeekdayCalendar);

    // Persistence assigns durable keys for everything the pass created.
    let mut remap = IdRemap::new();
    remap.map_schedule(schedule.id, ScheduleId::new());
    for node in &schedule.wbs {
        remap.map_wbs(node.id, WbsId::new());
    }
    for activity in &schedule.activities {
        remap.map_activity(activity.id, ActivityId::new());
    }
    let stored = schedule.remap(&remap);
    assert_ne!(stored.id, schedule.id);

    // Linkage survived the remap.
    let phase = stored.wbs.iter().find(|w| w.code == "1").unwrap();
    let design = stored.wbs.iter().find(|w| w.code == "1.1").unwrap();
    assert_eq!(design.parent, Some(phase.id));
    let a = stored.activity_by_code("A").unwrap();
    let b = stored.activity_by_code("B").unwrap();
    assert_eq!(b.predecessors[0].target, ActivityRef::Id(a.id));

    // And the regenerated file carries every record.
    let text = tabular::generate(&stored, &header());
    let parsed = tabular::parse(&text).unwrap();
    assert_eq!(parsed.meta.activities, 3);
    assert_eq!(parsed.meta.wbs_nodes, 2);
    let c = parsed.schedule.activity_by_code("C").unwrap();
    assert_eq!(c.start, Some(date(2024, 3, 9)));
    assert_eq!(c.end, Some(date(2024, 3, 13)));
}

#[test]
fn dependency_chain_dates_are_monotonic() {
    let mut skel = sample_skeleton();
    // Extend the chain with a longer run of tasks.
    for (i, days) in [2u32, 7, 1, 4].iter().enumerate() {
        skel.activities.push(cadence::scheduler::SkeletonActivity {
            code: format!("D{}", i),
            name: format!("Step {}", i),
            wbs_code: Some("1.1".to_string()),
            duration_days: *days,
            kind: cadence::model::ActivityKind::Task,
            predecessors: vec![if i == 0 {
                "C".to_string()
            } else {
                format!("D{}", i - 1)
            }],
        });
    }
    let schedule = scheduler::generate(&skel, &WeekdayCalendar);
    for activity in &schedule.activities {
        for pred in &activity.predecessors {
            if let ActivityRef::Id(pred_id) = &pred.target {
                let predecessor = schedule.activities.iter().find(|a| a.id == *pred_id).unwrap();
                assert!(
                    activity.start.unwrap() > predecessor.end.unwrap(),
                    "{} starts before {} ends",
                    activity.code,
                    predecessor.code
                );
            }
        }
    }
}

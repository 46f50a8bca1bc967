//! Format B: the nested XML business-object interchange format.
//!
//! A document is a business-object container holding one `Project`, which
//! in turn holds flat sequences of `WBS`, `Activity`, `Relationship`,
//! `Resource`, and `ResourceAssignment` elements. Records cross-reference
//! each other by `ObjectId` fields, never by position. Durations and lags
//! are ISO-8601 hour strings (`PT40H`); bare numeric durations read as days.
//!
//! Exporters disagree on the root container's name and case, and serialize
//! a lone child without a wrapping list; both tolerances live at the parse
//! boundary ([`child_ci`] and `Element::children_named`), not in the
//! record-processing code.

use std::collections::HashMap;

use crate::codec::arena::SurrogateArena;
use crate::codec::xml::{Element, XmlWriter};
use crate::codec::{
    format_file_date, hours_to_days, parse_file_date, FileHeader, ParseMeta, ParsedSchedule,
    SourceFormat, HOURS_PER_DAY,
};
use crate::error::{Error, Result};
use crate::model::{
    Activity, ActivityId, ActivityKind, ActivityRef, Predecessor, RelationType, Resource,
    ResourceAssignment, Schedule, WbsId, WbsNode,
};
use crate::{clog_debug, clog_warn};

/// Root container spellings seen in the wild.
const ROOT_CONTAINERS: &[&str] = &["APIBusinessObjects", "BusinessObjects"];

/// Parse format B text into the exchange model.
pub fn parse(text: &str) -> Result<ParsedSchedule> {
    let root = Element::parse(text)?;
    let project = find_project(&root).ok_or_else(|| Error::MissingElement("Project".to_string()))?;

    let mut schedule = Schedule::new(
        project.text_of("Name").unwrap_or("Imported schedule"),
    );
    schedule.start = project
        .text_of("PlannedStartDate")
        .or_else(|| project.text_of("StartDate"))
        .and_then(parse_file_date);
    schedule.end = project
        .text_of("FinishDate")
        .or_else(|| project.text_of("PlannedFinishDate"))
        .and_then(parse_file_date);

    let wbs_by_object = parse_wbs(project, &mut schedule);
    let activity_by_object = parse_activities(project, &mut schedule, &wbs_by_object)?;
    attach_relationships(project, &mut schedule, &activity_by_object)?;
    let resource_count = attach_assignments(project, &mut schedule, &activity_by_object)?;

    let meta = ParseMeta {
        format: SourceFormat::Tree,
        activities: schedule.activities.len(),
        wbs_nodes: schedule.wbs.len(),
        resources: resource_count,
        total_duration_days: schedule.total_duration_days(),
    };
    clog_debug!(
        "tree parse: {} activities, {} wbs nodes, {} resources",
        meta.activities,
        meta.wbs_nodes,
        meta.resources
    );
    Ok(ParsedSchedule { schedule, meta })
}

/// Case-insensitive child lookup, for container names only.
fn child_ci<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    element
        .children
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
}

fn find_project(root: &Element) -> Option<&Element> {
    if root.name.eq_ignore_ascii_case("Project") {
        return Some(root);
    }
    if ROOT_CONTAINERS
        .iter()
        .any(|c| root.name.eq_ignore_ascii_case(c))
    {
        return child_ci(root, "Project");
    }
    None
}

fn parse_wbs(project: &Element, schedule: &mut Schedule) -> HashMap<String, WbsId> {
    let mut by_object: HashMap<String, WbsId> = HashMap::new();
    let mut levels: HashMap<WbsId, u32> = HashMap::new();
    for (index, element) in project.children_named("WBS").enumerate() {
        let object_id = element.text_of("ObjectId").unwrap_or_default().to_string();
        let parent = match element.text_of("ParentObjectId") {
            None => None,
            Some(p) => match by_object.get(p) {
                Some(&id) => Some(id),
                None => {
                    clog_warn!(
                        "WBS {} references unknown parent {}, attaching to root",
                        object_id,
                        p
                    );
                    None
                }
            },
        };

        let id = WbsId::new();
        let level = parent
            .and_then(|p| levels.get(&p).copied())
            .map(|l| l + 1)
            .unwrap_or(1);
        levels.insert(id, level);
        if !object_id.is_empty() {
            by_object.insert(object_id, id);
        }

        let code = element
            .text_of("Code")
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("W{}", index + 1));
        let name = element
            .text_of("Name")
            .map(|s| s.to_string())
            .unwrap_or_else(|| code.clone());
        let sort_order = element
            .text_of("SequenceNumber")
            .and_then(|s| s.parse().ok())
            .unwrap_or(index as i32);

        schedule.wbs.push(WbsNode {
            id,
            parent,
            code,
            name,
            level,
            sort_order,
        });
    }
    by_object
}

fn parse_activities(
    project: &Element,
    schedule: &mut Schedule,
    wbs_by_object: &HashMap<String, WbsId>,
) -> Result<HashMap<String, usize>> {
    let mut by_object: HashMap<String, usize> = HashMap::new();
    for (index, element) in project.children_named("Activity").enumerate() {
        let code = element
            .text_of("Id")
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("T{}", index + 1));
        let name = element
            .text_of("Name")
            .map(|s| s.to_string())
            .unwrap_or_else(|| code.clone());
        let description = element.text_of("Description").map(|s| s.to_string());

        let kind = match element.text_of("Type") {
            Some(t) if t.to_ascii_lowercase().contains("milestone") => ActivityKind::Milestone,
            Some(t) if t.to_ascii_lowercase().contains("summary") => ActivityKind::Summary,
            _ => ActivityKind::Task,
        };

        let mut duration_days = match element.text_of("PlannedDuration") {
            Some(raw) => parse_duration(raw)?,
            None => 0.0,
        };
        if kind == ActivityKind::Milestone && duration_days != 0.0 {
            clog_warn!(
                "activity {} is a milestone with nonzero duration, clamping to 0",
                code
            );
            duration_days = 0.0;
        }

        let wbs = match element.text_of("WBSObjectId") {
            None => None,
            Some(object_id) => match wbs_by_object.get(object_id) {
                Some(&id) => Some(id),
                None => {
                    clog_warn!(
                        "activity {} references unknown WBS {}, leaving unassigned",
                        code,
                        object_id
                    );
                    None
                }
            },
        };

        let start = element
            .text_of("PlannedStartDate")
            .and_then(parse_file_date);
        let mut end = element
            .text_of("PlannedFinishDate")
            .and_then(parse_file_date);
        if kind == ActivityKind::Milestone && start.is_some() && end != start {
            end = start;
        }

        if let Some(object_id) = element.text_of("ObjectId") {
            by_object.insert(object_id.to_string(), index);
        }
        schedule.activities.push(Activity {
            id: ActivityId::new(),
            wbs,
            code,
            name,
            description,
            duration_days,
            start,
            end,
            kind,
            predecessors: Vec::new(),
            resources: Vec::new(),
        });
    }
    Ok(by_object)
}

fn attach_relationships(
    project: &Element,
    schedule: &mut Schedule,
    activity_by_object: &HashMap<String, usize>,
) -> Result<()> {
    for element in project.children_named("Relationship") {
        let successor = element
            .text_of("SuccessorActivityObjectId")
            .and_then(|s| activity_by_object.get(s).copied());
        let predecessor = element
            .text_of("PredecessorActivityObjectId")
            .and_then(|s| activity_by_object.get(s).copied());
        let (successor, predecessor) = match (successor, predecessor) {
            (Some(s), Some(p)) => (s, p),
            _ => {
                clog_warn!("relationship references an unknown activity, dropping link");
                continue;
            }
        };

        let relation = relation_from_name(element.text_of("Type").unwrap_or_default());
        let lag_days = match element.text_of("Lag") {
            Some(raw) => parse_duration(raw)?.round() as i64,
            None => 0,
        };
        let code = schedule.activities[predecessor].code.clone();
        schedule.activities[successor].predecessors.push(Predecessor {
            target: ActivityRef::Code(code),
            relation,
            lag_days,
        });
    }
    Ok(())
}

fn attach_assignments(
    project: &Element,
    schedule: &mut Schedule,
    activity_by_object: &HashMap<String, usize>,
) -> Result<usize> {
    let mut resources_by_object: HashMap<String, Resource> = HashMap::new();
    for (index, element) in project.children_named("Resource").enumerate() {
        let object_id = match element.text_of("ObjectId") {
            Some(s) => s.to_string(),
            None => continue,
        };
        let code = element
            .text_of("Id")
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("R{}", index + 1));
        let name = element
            .text_of("Name")
            .map(|s| s.to_string())
            .unwrap_or_else(|| code.clone());
        resources_by_object.insert(
            object_id,
            Resource {
                id: None,
                code,
                name,
            },
        );
    }

    for element in project.children_named("ResourceAssignment") {
        let task = element
            .text_of("ActivityObjectId")
            .and_then(|s| activity_by_object.get(s).copied());
        let resource = element
            .text_of("ResourceObjectId")
            .and_then(|s| resources_by_object.get(s));
        let (task, resource) = match (task, resource) {
            (Some(t), Some(r)) => (t, r),
            _ => {
                clog_warn!("resource assignment fails to join, dropping");
                continue;
            }
        };
        let units = match element.text_of("PlannedUnits") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Number(raw.to_string()))?,
            None => 1.0,
        };
        schedule.activities[task].resources.push(ResourceAssignment {
            resource: resource.clone(),
            units,
        });
    }
    Ok(schedule.distinct_resources().len())
}

/// `PT<hours>H` reads as hours; a bare numeric string is already days.
fn parse_duration(raw: &str) -> Result<f64> {
    let raw = raw.trim();
    if let Some(hours) = raw
        .strip_prefix("PT")
        .or_else(|| raw.strip_prefix("pt"))
        .and_then(|r| r.strip_suffix('H').or_else(|| r.strip_suffix('h')))
    {
        let hours: f64 = hours
            .parse()
            .map_err(|_| Error::Number(raw.to_string()))?;
        return Ok(hours_to_days(hours));
    }
    raw.parse().map_err(|_| Error::Number(raw.to_string()))
}

fn format_duration(days: f64) -> String {
    format!("PT{}H", days * HOURS_PER_DAY)
}

fn relation_from_name(name: &str) -> RelationType {
    match name.to_ascii_lowercase().as_str() {
        "finish to finish" => RelationType::FinishToFinish,
        "start to start" => RelationType::StartToStart,
        "start to finish" => RelationType::StartToFinish,
        _ => RelationType::FinishToStart,
    }
}

fn relation_to_name(relation: RelationType) -> &'static str {
    match relation {
        RelationType::FinishToStart => "Finish to Start",
        RelationType::FinishToFinish => "Finish to Finish",
        RelationType::StartToStart => "Start to Start",
        RelationType::StartToFinish => "Start to Finish",
    }
}

fn activity_type_name(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Task => "Task Dependent",
        ActivityKind::Milestone => "Start Milestone",
        ActivityKind::Summary => "WBS Summary",
    }
}

/// Generate format B text from a fully identified schedule.
///
/// Element order mirrors the tabular emission order: WBS, activities,
/// relationships, resources, resource assignments. Fresh ascending
/// `ObjectId`s come from per-call arenas; every text-bearing field is
/// escaped.
pub fn generate(schedule: &Schedule, header: &FileHeader) -> String {
    let mut w = XmlWriter::new();
    w.open("APIBusinessObjects");
    w.open("Project");
    w.leaf("ObjectId", "1");
    w.leaf("Name", &schedule.name);
    if let Some(description) = &schedule.description {
        w.leaf("Description", description);
    }
    w.leaf("CreateUser", &header.product);
    w.leaf("CreateDate", &format_file_date(header.date));
    if let Some(start) = schedule.start {
        w.leaf("PlannedStartDate", &format_file_date(start));
    }
    if let Some(end) = schedule.end {
        w.leaf("FinishDate", &format_file_date(end));
    }

    let mut wbs_arena = SurrogateArena::new(1);
    let mut wbs_by_id: HashMap<WbsId, i64> = HashMap::new();
    for node in &schedule.wbs {
        let object_id = wbs_arena.assign(node.code.clone());
        wbs_by_id.insert(node.id, object_id);
        w.open("WBS");
        w.leaf("ObjectId", &object_id.to_string());
        w.leaf("Code", &node.code);
        w.leaf("Name", &node.name);
        if let Some(parent) = node.parent {
            match wbs_by_id.get(&parent) {
                Some(p) => w.leaf("ParentObjectId", &p.to_string()),
                None => clog_warn!(
                    "wbs node {} lists its parent after itself, attaching to root",
                    node.code
                ),
            }
        }
        w.leaf("SequenceNumber", &node.sort_order.to_string());
        w.close();
    }

    let mut task_arena = SurrogateArena::new(1);
    let mut task_by_id: HashMap<ActivityId, i64> = HashMap::new();
    for activity in &schedule.activities {
        let object_id = task_arena.assign(activity.code.clone());
        task_by_id.insert(activity.id, object_id);
        w.open("Activity");
        w.leaf("ObjectId", &object_id.to_string());
        w.leaf("Id", &activity.code);
        w.leaf("Name", &activity.name);
        if let Some(description) = &activity.description {
            w.leaf("Description", description);
        }
        w.leaf("Type", activity_type_name(activity.kind));
        if let Some(wbs) = activity.wbs.and_then(|id| wbs_by_id.get(&id)) {
            w.leaf("WBSObjectId", &wbs.to_string());
        }
        w.leaf("PlannedDuration", &format_duration(activity.duration_days));
        if let Some(start) = activity.start.or(schedule.start) {
            w.leaf("PlannedStartDate", &format_file_date(start));
        }
        if let Some(end) = activity.end.or(schedule.end) {
            w.leaf("PlannedFinishDate", &format_file_date(end));
        }
        w.close();
    }

    let mut link_arena = SurrogateArena::new(1);
    for activity in &schedule.activities {
        let successor = match task_by_id.get(&activity.id) {
            Some(&s) => s,
            None => continue,
        };
        for pred in &activity.predecessors {
            let target = match &pred.target {
                ActivityRef::Id(id) => task_by_id.get(id).copied(),
                ActivityRef::Code(code) => task_arena.lookup(code),
            };
            let target = match target {
                Some(t) => t,
                None => {
                    clog_warn!(
                        "activity {} references unknown predecessor {}, dropping link",
                        activity.code,
                        pred.target
                    );
                    continue;
                }
            };
            let object_id = link_arena.assign(format!("{}->{}", target, successor));
            w.open("Relationship");
            w.leaf("ObjectId", &object_id.to_string());
            w.leaf("PredecessorActivityObjectId", &target.to_string());
            w.leaf("SuccessorActivityObjectId", &successor.to_string());
            w.leaf("Type", relation_to_name(pred.relation));
            w.leaf("Lag", &format_duration(pred.lag_days as f64));
            w.close();
        }
    }

    let resources = schedule.distinct_resources();
    let mut rsrc_arena = SurrogateArena::new(1);
    for resource in &resources {
        let object_id = rsrc_arena.assign(resource.code.clone());
        w.open("Resource");
        w.leaf("ObjectId", &object_id.to_string());
        w.leaf("Id", &resource.code);
        w.leaf("Name", &resource.name);
        w.close();
    }

    let mut assign_arena = SurrogateArena::new(1);
    for activity in &schedule.activities {
        let task = match task_by_id.get(&activity.id) {
            Some(&t) => t,
            None => continue,
        };
        for assignment in &activity.resources {
            let resource = match rsrc_arena.lookup(&assignment.resource.code) {
                Some(r) => r,
                None => continue,
            };
            let object_id = assign_arena.assign(format!("{}:{}", task, resource));
            w.open("ResourceAssignment");
            w.leaf("ObjectId", &object_id.to_string());
            w.leaf("ActivityObjectId", &task.to_string());
            w.leaf("ResourceObjectId", &resource.to_string());
            w.leaf("PlannedUnits", &assignment.units.to_string());
            w.close();
        }
    }

    clog_debug!(
        "tree generate: {} activities, {} wbs nodes, {} resources",
        schedule.activities.len(),
        schedule.wbs.len(),
        resources.len()
    );
    w.finish()
}

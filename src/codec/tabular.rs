//! Format A: the tab-delimited record-block interchange format.
//!
//! A file is a header line, then table blocks, then an end marker:
//!
//! ```text
//! ERMHDR <version> <date> <product> <organization> <project>
//! %T     <table name>
//! %F     <field names...>
//! %R     <values...>
//! %E
//! ```
//!
//! All cells are tab-separated. Records cross-reference each other through
//! file-local surrogate integer ids; both directions of this codec build
//! those tables fresh per call and discard them (see
//! [`SurrogateArena`](super::arena::SurrogateArena)).

use std::collections::HashMap;

use crate::codec::arena::SurrogateArena;
use crate::codec::{
    ambiguous_duration_to_days, format_file_date, hours_to_days, FileHeader, ParseMeta,
    ParsedSchedule, SourceFormat, HOURS_PER_DAY,
};
use crate::error::{Error, Result};
use crate::model::{
    Activity, ActivityId, ActivityKind, ActivityRef, Predecessor, RelationType, Resource,
    ResourceAssignment, Schedule, WbsId, WbsNode,
};
use crate::{clog_debug, clog_warn};

const HEADER_MARKER: &str = "ERMHDR";
const TABLE_MARKER: &str = "%T";
const FIELDS_MARKER: &str = "%F";
const RECORD_MARKER: &str = "%R";
const END_MARKER: &str = "%E";

// Emitted field layouts. Third-party importers match on these names and
// orders, so they are fixed.
const PROJECT_FIELDS: &[&str] = &[
    "proj_id",
    "proj_short_name",
    "proj_name",
    "plan_start_date",
    "plan_end_date",
];
const CALENDAR_FIELDS: &[&str] = &["clndr_id", "clndr_name", "day_hr_cnt"];
const PROJWBS_FIELDS: &[&str] = &[
    "wbs_id",
    "proj_id",
    "wbs_short_name",
    "wbs_name",
    "parent_wbs_id",
    "proj_node_flag",
    "seq_num",
];
const TASK_FIELDS: &[&str] = &[
    "task_id",
    "proj_id",
    "wbs_id",
    "clndr_id",
    "task_code",
    "task_name",
    "task_type",
    "target_drtn_hr_cnt",
    "target_start_date",
    "target_end_date",
];
const TASKPRED_FIELDS: &[&str] = &[
    "task_pred_id",
    "task_id",
    "pred_task_id",
    "proj_id",
    "pred_type",
    "lag_hr_cnt",
];
const RSRC_FIELDS: &[&str] = &["rsrc_id", "rsrc_short_name", "rsrc_name"];
const TASKRSRC_FIELDS: &[&str] = &[
    "taskrsrc_id",
    "task_id",
    "proj_id",
    "rsrc_id",
    "target_qty",
];

/// One table block scanned out of the file.
#[derive(Debug, Default)]
struct Table {
    fields: Vec<String>,
    rows: Vec<Row>,
}

#[derive(Debug)]
struct Row {
    line: usize,
    values: Vec<String>,
}

impl Table {
    /// Value of `field` in `row`, trimmed; empty cells and unknown fields
    /// read as absent.
    fn get<'a>(&self, row: &'a Row, field: &str) -> Option<&'a str> {
        let idx = self.fields.iter().position(|f| f == field)?;
        row.values
            .get(idx)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Parse format A text into the exchange model.
///
/// Structural failures (missing TASK table, a record wider than its field
/// list) abort with an error; unresolved cross-references degrade to root
/// attachment or dropped links, logged at warn.
pub fn parse(text: &str) -> Result<ParsedSchedule> {
    let tables = scan_tables(text)?;

    let task_table = tables
        .get("TASK")
        .ok_or_else(|| Error::MissingTable("TASK".to_string()))?;

    let mut schedule = parse_project(&tables);
    let (wbs_by_surrogate, root_surrogate) = parse_wbs(&tables, &mut schedule);

    // Surrogate task id -> index into activities; predecessors and
    // resource assignments join through this.
    let mut task_by_surrogate: HashMap<String, usize> = HashMap::new();
    for (index, row) in task_table.rows.iter().enumerate() {
        let activity = parse_task(
            task_table,
            row,
            index,
            &wbs_by_surrogate,
            root_surrogate.as_deref(),
        )?;
        if let Some(surrogate) = task_table.get(row, "task_id") {
            task_by_surrogate.insert(surrogate.to_string(), index);
        }
        schedule.activities.push(activity);
    }

    attach_predecessors(&tables, &mut schedule, &task_by_surrogate)?;
    let resource_count = attach_resources(&tables, &mut schedule, &task_by_surrogate)?;

    let meta = ParseMeta {
        format: SourceFormat::Tabular,
        activities: schedule.activities.len(),
        wbs_nodes: schedule.wbs.len(),
        resources: resource_count,
        total_duration_days: schedule.total_duration_days(),
    };
    clog_debug!(
        "tabular parse: {} activities, {} wbs nodes, {} resources",
        meta.activities,
        meta.wbs_nodes,
        meta.resources
    );
    Ok(ParsedSchedule { schedule, meta })
}

fn scan_tables(text: &str) -> Result<HashMap<String, Table>> {
    let mut tables: HashMap<String, Table> = HashMap::new();
    let mut current: Option<String> = None;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if line.is_empty() {
            continue;
        }
        let mut cells = line.split('\t');
        let marker = cells.next().unwrap_or_default();
        match marker {
            HEADER_MARKER | END_MARKER => current = None,
            TABLE_MARKER => {
                let name = cells.next().unwrap_or_default().trim().to_string();
                if name.is_empty() {
                    return Err(Error::MalformedRecord {
                        table: "(none)".to_string(),
                        line: line_no,
                        reason: "table marker without a name".to_string(),
                    });
                }
                tables.entry(name.clone()).or_default();
                current = Some(name);
            }
            FIELDS_MARKER => {
                let name = current.clone().ok_or_else(|| Error::MalformedRecord {
                    table: "(none)".to_string(),
                    line: line_no,
                    reason: "field list outside of a table block".to_string(),
                })?;
                if let Some(table) = tables.get_mut(&name) {
                    table.fields = cells.map(|c| c.trim().to_string()).collect();
                }
            }
            RECORD_MARKER => {
                let name = current.clone().ok_or_else(|| Error::MalformedRecord {
                    table: "(none)".to_string(),
                    line: line_no,
                    reason: "record outside of a table block".to_string(),
                })?;
                if let Some(table) = tables.get_mut(&name) {
                    let mut values: Vec<String> = cells.map(|c| c.to_string()).collect();
                    if values.len() > table.fields.len() {
                        return Err(Error::MalformedRecord {
                            table: name,
                            line: line_no,
                            reason: format!(
                                "{} values for {} fields",
                                values.len(),
                                table.fields.len()
                            ),
                        });
                    }
                    // Exporters routinely drop trailing empty cells.
                    values.resize(table.fields.len(), String::new());
                    table.rows.push(Row {
                        line: line_no,
                        values,
                    });
                }
            }
            _ => {
                // Unknown markers (and continuation noise) are skipped so a
                // newer exporter revision does not break ingestion.
            }
        }
    }
    Ok(tables)
}

fn parse_project(tables: &HashMap<String, Table>) -> Schedule {
    let mut schedule = Schedule::new("Imported schedule");
    if let Some(project) = tables.get("PROJECT") {
        if let Some(row) = project.rows.first() {
            if let Some(name) = project
                .get(row, "proj_name")
                .or_else(|| project.get(row, "proj_short_name"))
            {
                schedule.name = name.to_string();
            }
            schedule.start = project
                .get(row, "plan_start_date")
                .and_then(super::parse_file_date);
            schedule.end = project
                .get(row, "plan_end_date")
                .and_then(super::parse_file_date);
        }
    }
    schedule
}

/// Build WBS nodes from the PROJWBS table, returning surrogate id -> node id.
///
/// The file's project-node record is the implicit hierarchy root: children
/// pointing at it become root nodes here. Parents must appear before their
/// children; a forward or dangling parent reference degrades to root
/// attachment.
fn parse_wbs(
    tables: &HashMap<String, Table>,
    schedule: &mut Schedule,
) -> (HashMap<String, WbsId>, Option<String>) {
    let mut by_surrogate: HashMap<String, WbsId> = HashMap::new();
    let mut levels: HashMap<WbsId, u32> = HashMap::new();
    let table = match tables.get("PROJWBS") {
        Some(table) => table,
        None => return (by_surrogate, None),
    };

    let mut root_surrogate: Option<String> = None;
    for (index, row) in table.rows.iter().enumerate() {
        let surrogate = table.get(row, "wbs_id").unwrap_or_default().to_string();
        if table.get(row, "proj_node_flag") == Some("Y") {
            root_surrogate = Some(surrogate);
            continue;
        }

        let parent = match table.get(row, "parent_wbs_id") {
            None => None,
            Some(p) if Some(p) == root_surrogate.as_deref() => None,
            Some(p) => match by_surrogate.get(p) {
                Some(&id) => Some(id),
                None => {
                    clog_warn!(
                        "PROJWBS record at line {} references unknown parent {}, attaching to root",
                        row.line,
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
        if !surrogate.is_empty() {
            by_surrogate.insert(surrogate.clone(), id);
        }

        let code = table
            .get(row, "wbs_short_name")
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("W{}", index + 1));
        let name = table
            .get(row, "wbs_name")
            .map(|s| s.to_string())
            .unwrap_or_else(|| code.clone());
        let sort_order = table
            .get(row, "seq_num")
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
    (by_surrogate, root_surrogate)
}

fn parse_task(
    table: &Table,
    row: &Row,
    index: usize,
    wbs_by_surrogate: &HashMap<String, WbsId>,
    root_surrogate: Option<&str>,
) -> Result<Activity> {
    let code = table
        .get(row, "task_code")
        .or_else(|| table.get(row, "task_id"))
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("T{}", index + 1));
    let name = table
        .get(row, "task_name")
        .map(|s| s.to_string())
        .unwrap_or_else(|| code.clone());
    let description = table.get(row, "task_notes").map(|s| s.to_string());

    // Hour-named fields are always hours. Only a bare duration column of
    // unknown unit consults the magnitude heuristic.
    let mut duration_days = match table.get(row, "target_drtn_hr_cnt") {
        Some(raw) => hours_to_days(parse_number(raw)?),
        None => match table.get(row, "duration") {
            Some(raw) => ambiguous_duration_to_days(parse_number(raw)?),
            None => 0.0,
        },
    };

    let kind = match table.get(row, "task_type") {
        Some(t) if t.contains("Mile") => ActivityKind::Milestone,
        Some("TT_WBS") => ActivityKind::Summary,
        _ => ActivityKind::Task,
    };
    if kind == ActivityKind::Milestone && duration_days != 0.0 {
        clog_warn!(
            "TASK record at line {} is a milestone with nonzero duration, clamping to 0",
            row.line
        );
        duration_days = 0.0;
    }

    let wbs = match table.get(row, "wbs_id") {
        None => None,
        // The file's project node is the implicit root: unassigned here.
        Some(surrogate) if Some(surrogate) == root_surrogate => None,
        Some(surrogate) => match wbs_by_surrogate.get(surrogate) {
            Some(&id) => Some(id),
            None => {
                clog_warn!(
                    "TASK record at line {} references unknown wbs {}, leaving unassigned",
                    row.line,
                    surrogate
                );
                None
            }
        },
    };

    let start = table
        .get(row, "target_start_date")
        .and_then(super::parse_file_date);
    let mut end = table
        .get(row, "target_end_date")
        .and_then(super::parse_file_date);
    if kind == ActivityKind::Milestone && start.is_some() && end != start {
        end = start;
    }

    Ok(Activity {
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
    })
}

/// Resolve TASKPRED links to predecessor *codes* and attach them to their
/// successors. Links with an unresolvable endpoint are dropped.
fn attach_predecessors(
    tables: &HashMap<String, Table>,
    schedule: &mut Schedule,
    task_by_surrogate: &HashMap<String, usize>,
) -> Result<()> {
    let table = match tables.get("TASKPRED") {
        Some(table) => table,
        None => return Ok(()),
    };
    for row in &table.rows {
        let successor = table
            .get(row, "task_id")
            .and_then(|s| task_by_surrogate.get(s).copied());
        let predecessor = table
            .get(row, "pred_task_id")
            .and_then(|s| task_by_surrogate.get(s).copied());
        let (successor, predecessor) = match (successor, predecessor) {
            (Some(s), Some(p)) => (s, p),
            _ => {
                clog_warn!(
                    "TASKPRED record at line {} references an unknown task, dropping link",
                    row.line
                );
                continue;
            }
        };

        let relation = relation_from_marker(table.get(row, "pred_type").unwrap_or("PR_FS"));
        let lag_days = match table.get(row, "lag_hr_cnt") {
            Some(raw) => hours_to_days(parse_number(raw)?).round() as i64,
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

/// Join TASKRSRC assignments through the RSRC table onto activities.
/// Returns the count of distinct resources seen.
fn attach_resources(
    tables: &HashMap<String, Table>,
    schedule: &mut Schedule,
    task_by_surrogate: &HashMap<String, usize>,
) -> Result<usize> {
    let mut resources_by_surrogate: HashMap<String, Resource> = HashMap::new();
    if let Some(table) = tables.get("RSRC") {
        for (index, row) in table.rows.iter().enumerate() {
            let surrogate = match table.get(row, "rsrc_id") {
                Some(s) => s.to_string(),
                None => continue,
            };
            let code = table
                .get(row, "rsrc_short_name")
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("R{}", index + 1));
            let name = table
                .get(row, "rsrc_name")
                .map(|s| s.to_string())
                .unwrap_or_else(|| code.clone());
            resources_by_surrogate.insert(
                surrogate,
                Resource {
                    id: None,
                    code,
                    name,
                },
            );
        }
    }

    if let Some(table) = tables.get("TASKRSRC") {
        for row in &table.rows {
            let task = table
                .get(row, "task_id")
                .and_then(|s| task_by_surrogate.get(s).copied());
            let resource = table
                .get(row, "rsrc_id")
                .and_then(|s| resources_by_surrogate.get(s));
            let (task, resource) = match (task, resource) {
                (Some(t), Some(r)) => (t, r),
                _ => {
                    clog_warn!(
                        "TASKRSRC record at line {} fails to join, dropping assignment",
                        row.line
                    );
                    continue;
                }
            };
            let units = match table.get(row, "target_qty") {
                Some(raw) => parse_number(raw)?,
                None => 1.0,
            };
            schedule.activities[task].resources.push(ResourceAssignment {
                resource: resource.clone(),
                units,
            });
        }
    }
    Ok(schedule.distinct_resources().len())
}

fn parse_number(raw: &str) -> Result<f64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Number(raw.to_string()))
}

fn relation_from_marker(marker: &str) -> RelationType {
    match marker {
        "PR_FF" => RelationType::FinishToFinish,
        "PR_SS" => RelationType::StartToStart,
        "PR_SF" => RelationType::StartToFinish,
        _ => RelationType::FinishToStart,
    }
}

fn relation_to_marker(relation: RelationType) -> &'static str {
    match relation {
        RelationType::FinishToStart => "PR_FS",
        RelationType::FinishToFinish => "PR_FF",
        RelationType::StartToStart => "PR_SS",
        RelationType::StartToFinish => "PR_SF",
    }
}

/// Tabs and newlines are cell/record separators, so they cannot survive
/// inside an emitted text field.
fn clean_field(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

/// Generate format A text from a fully identified schedule.
///
/// Emission order and field layouts are fixed; see the module docs. Every
/// activity and WBS node in the input appears in the output. Surrogate ids
/// ascend within this one call and carry no meaning beyond it.
pub fn generate(schedule: &Schedule, header: &FileHeader) -> String {
    let mut out = String::new();
    push_row(
        &mut out,
        HEADER_MARKER,
        &[
            &header.version,
            &format_file_date(header.date),
            &header.product,
            &clean_field(&header.organization),
            &clean_field(&header.project),
        ],
    );

    // PROJECT
    let proj_id = "1";
    let start = schedule.start.map(format_file_date).unwrap_or_default();
    let end = schedule.end.map(format_file_date).unwrap_or_default();
    push_table_header(&mut out, "PROJECT", PROJECT_FIELDS);
    push_row(
        &mut out,
        RECORD_MARKER,
        &[
            proj_id,
            &clean_field(&schedule.name),
            &clean_field(&schedule.name),
            &start,
            &end,
        ],
    );

    // CALENDAR: one fixed default business calendar.
    let calendar_id = "1";
    push_table_header(&mut out, "CALENDAR", CALENDAR_FIELDS);
    push_row(
        &mut out,
        RECORD_MARKER,
        &[calendar_id, "Standard 5 Day Workweek", "8"],
    );

    // PROJWBS: implicit root first, then the nodes in list order. Parents
    // map through the same-pass arena, so a parent listed after its child
    // falls back to the root.
    let mut wbs_arena = SurrogateArena::new(1);
    let mut wbs_by_id: HashMap<WbsId, i64> = HashMap::new();
    let root_wbs = wbs_arena.assign("__root__");
    push_table_header(&mut out, "PROJWBS", PROJWBS_FIELDS);
    push_row(
        &mut out,
        RECORD_MARKER,
        &[
            &root_wbs.to_string(),
            proj_id,
            &clean_field(&schedule.name),
            &clean_field(&schedule.name),
            "",
            "Y",
            "0",
        ],
    );
    for node in &schedule.wbs {
        let surrogate = wbs_arena.assign(node.code.clone());
        wbs_by_id.insert(node.id, surrogate);
        let parent = match node.parent {
            None => root_wbs,
            Some(parent_id) => match wbs_by_id.get(&parent_id) {
                Some(&p) => p,
                None => {
                    clog_warn!(
                        "wbs node {} lists its parent after itself, attaching to root",
                        node.code
                    );
                    root_wbs
                }
            },
        };
        push_row(
            &mut out,
            RECORD_MARKER,
            &[
                &surrogate.to_string(),
                proj_id,
                &clean_field(&node.code),
                &clean_field(&node.name),
                &parent.to_string(),
                "N",
                &node.sort_order.to_string(),
            ],
        );
    }

    // TASK
    let mut task_arena = SurrogateArena::new(1);
    let mut task_by_id: HashMap<ActivityId, i64> = HashMap::new();
    push_table_header(&mut out, "TASK", TASK_FIELDS);
    for activity in &schedule.activities {
        let surrogate = task_arena.assign(activity.code.clone());
        task_by_id.insert(activity.id, surrogate);
        let wbs = activity
            .wbs
            .and_then(|id| wbs_by_id.get(&id).copied())
            .unwrap_or(root_wbs);
        let task_start = activity.start.or(schedule.start);
        let task_end = activity.end.or(schedule.end);
        push_row(
            &mut out,
            RECORD_MARKER,
            &[
                &surrogate.to_string(),
                proj_id,
                &wbs.to_string(),
                calendar_id,
                &clean_field(&activity.code),
                &clean_field(&activity.name),
                task_type_marker(activity.kind),
                &(activity.duration_days * HOURS_PER_DAY).to_string(),
                &task_start.map(format_file_date).unwrap_or_default(),
                &task_end.map(format_file_date).unwrap_or_default(),
            ],
        );
    }

    // TASKPRED
    let mut pred_arena = SurrogateArena::new(1);
    push_table_header(&mut out, "TASKPRED", TASKPRED_FIELDS);
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
            let link = pred_arena.assign(format!("{}->{}", target, successor));
            push_row(
                &mut out,
                RECORD_MARKER,
                &[
                    &link.to_string(),
                    &successor.to_string(),
                    &target.to_string(),
                    proj_id,
                    relation_to_marker(pred.relation),
                    &((pred.lag_days as f64) * HOURS_PER_DAY).to_string(),
                ],
            );
        }
    }

    // RSRC and TASKRSRC, only when anything is assigned.
    let resources = schedule.distinct_resources();
    if !resources.is_empty() {
        let mut rsrc_arena = SurrogateArena::new(1);
        push_table_header(&mut out, "RSRC", RSRC_FIELDS);
        for resource in &resources {
            let surrogate = rsrc_arena.assign(resource.code.clone());
            push_row(
                &mut out,
                RECORD_MARKER,
                &[
                    &surrogate.to_string(),
                    &clean_field(&resource.code),
                    &clean_field(&resource.name),
                ],
            );
        }

        let mut assign_arena = SurrogateArena::new(1);
        push_table_header(&mut out, "TASKRSRC", TASKRSRC_FIELDS);
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
                let surrogate = assign_arena.assign(format!("{}:{}", task, resource));
                push_row(
                    &mut out,
                    RECORD_MARKER,
                    &[
                        &surrogate.to_string(),
                        &task.to_string(),
                        proj_id,
                        &resource.to_string(),
                        &assignment.units.to_string(),
                    ],
                );
            }
        }
    }

    out.push_str(END_MARKER);
    out.push('\n');
    clog_debug!(
        "tabular generate: {} activities, {} wbs nodes, {} resources",
        schedule.activities.len(),
        schedule.wbs.len(),
        resources.len()
    );
    out
}

fn task_type_marker(kind: ActivityKind) -> &'static str {
    match kind {
        ActivityKind::Task => "TT_Task",
        ActivityKind::Milestone => "TT_Mile",
        ActivityKind::Summary => "TT_WBS",
    }
}

fn push_table_header(out: &mut String, name: &str, fields: &[&str]) {
    push_row(out, TABLE_MARKER, &[name]);
    push_row(out, FIELDS_MARKER, fields);
}

fn push_row(out: &mut String, marker: &str, cells: &[&str]) {
    out.push_str(marker);
    for cell in cells {
        out.push('\t');
        out.push_str(cell);
    }
    out.push('\n');
}

//! Schedule Exchange Model (SEM).
//!
//! The normalized, format-agnostic representation every component reads and
//! writes: codecs parse into it and generate from it, the scheduler produces
//! it, and the persistence collaborator stores it. Values are transient:
//! every transformation returns a new value, nothing is mutated in place.
//!
//! Identifiers come in two spaces that are never interchangeable:
//! human-chosen **codes** (unique only within one schedule) and durable
//! **ids** (uuid newtypes here, assigned fresh by the engine and remapped to
//! storage keys by the persistence collaborator via [`Schedule::remap`]).
//! [`ActivityRef`] keeps the resolution state explicit at every boundary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new unique identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Return first 8 characters of the UUID for display.
            pub fn short(&self) -> String {
                self.0.to_string()[..8].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a schedule.
    ScheduleId
}
uuid_id! {
    /// Unique identifier for a work-breakdown-structure node.
    WbsId
}
uuid_id! {
    /// Unique identifier for an activity.
    ActivityId
}
uuid_id! {
    /// Unique identifier for a resource.
    ResourceId
}

/// A fully described schedule: WBS hierarchy plus activities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    pub description: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub wbs: Vec<WbsNode>,
    pub activities: Vec<Activity>,
}

/// A node of the work-breakdown structure.
///
/// `parent = None` means the node hangs off the hierarchy root. A node must
/// never be its own ancestor, and `level` is the parent's level + 1 (1 for
/// root nodes).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WbsNode {
    pub id: WbsId,
    pub parent: Option<WbsId>,
    /// Human-readable dotted code, e.g. "1.2".
    pub code: String,
    pub name: String,
    /// Depth in the hierarchy, root = 1.
    pub level: u32,
    /// Stable ordering among same-parent siblings.
    pub sort_order: i32,
}

/// The kind of a schedulable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Task,
    Milestone,
    Summary,
}

impl Default for ActivityKind {
    fn default() -> Self {
        Self::Task
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityKind::Task => write!(f, "task"),
            ActivityKind::Milestone => write!(f, "milestone"),
            ActivityKind::Summary => write!(f, "summary"),
        }
    }
}

/// A schedulable unit of work.
///
/// Invariant: `kind == Milestone` implies `duration_days == 0` and
/// `start == end`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: ActivityId,
    /// Owning WBS node; `None` attaches to the implicit root.
    pub wbs: Option<WbsId>,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Duration in days; 0 for milestones. Parsed foreign files may carry
    /// fractional days.
    pub duration_days: f64,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub kind: ActivityKind,
    pub predecessors: Vec<Predecessor>,
    pub resources: Vec<ResourceAssignment>,
}

impl Activity {
    pub fn is_milestone(&self) -> bool {
        self.kind == ActivityKind::Milestone
    }
}

/// Reference to an activity, tagged with its resolution state.
///
/// `Code` references are schedule-local (skeletons, freshly parsed files);
/// `Id` references are durable. Components that cross the boundary perform
/// an explicit remapping pass rather than treating the two as
/// interchangeable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by", content = "ref")]
pub enum ActivityRef {
    Id(ActivityId),
    Code(String),
}

impl std::fmt::Display for ActivityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityRef::Id(id) => write!(f, "id:{}", id.short()),
            ActivityRef::Code(code) => write!(f, "code:{}", code),
        }
    }
}

/// The relationship type of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    FinishToStart,
    FinishToFinish,
    StartToStart,
    StartToFinish,
}

impl Default for RelationType {
    fn default() -> Self {
        Self::FinishToStart
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationType::FinishToStart => write!(f, "finish-to-start"),
            RelationType::FinishToFinish => write!(f, "finish-to-finish"),
            RelationType::StartToStart => write!(f, "start-to-start"),
            RelationType::StartToFinish => write!(f, "start-to-finish"),
        }
    }
}

/// A dependency edge on the successor's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Predecessor {
    pub target: ActivityRef,
    pub relation: RelationType,
    /// Lag in whole days; may be negative.
    pub lag_days: i64,
}

impl Predecessor {
    /// Finish-to-start edge with no lag, referencing by code.
    pub fn by_code(code: impl Into<String>) -> Self {
        Self {
            target: ActivityRef::Code(code.into()),
            relation: RelationType::FinishToStart,
            lag_days: 0,
        }
    }
}

/// A resource that can be assigned to activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: Option<ResourceId>,
    pub code: String,
    pub name: String,
}

/// Assignment of a resource to an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAssignment {
    pub resource: Resource,
    /// Assigned units; not necessarily integral.
    pub units: f64,
}

impl Schedule {
    /// Create an empty schedule with a fresh identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ScheduleId::new(),
            name: name.into(),
            description: None,
            start: None,
            end: None,
            wbs: Vec::new(),
            activities: Vec::new(),
        }
    }

    /// Distinct resources referenced across all assignments, in
    /// first-appearance order. Both file generators emit from this.
    pub fn distinct_resources(&self) -> Vec<&Resource> {
        let mut seen: Vec<&Resource> = Vec::new();
        for activity in &self.activities {
            for assignment in &activity.resources {
                if !seen.iter().any(|r| r.code == assignment.resource.code) {
                    seen.push(&assignment.resource);
                }
            }
        }
        seen
    }

    /// Sum of all activity durations, in days. Informational metadata only.
    pub fn total_duration_days(&self) -> f64 {
        self.activities.iter().map(|a| a.duration_days).sum()
    }

    /// Look up an activity by its schedule-local code.
    pub fn activity_by_code(&self, code: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.code == code)
    }

    /// Remap every engine-assigned identifier to a durable one.
    ///
    /// This is the persistence boundary: the collaborator stores the
    /// schedule, allocates durable keys, and asks for a copy keyed by them.
    /// Every parent/WBS/predecessor linkage is preserved; predecessor
    /// `Code` references whose code names a known activity are promoted to
    /// `Id` references. Ids absent from the map are left untouched.
    pub fn remap(&self, remap: &IdRemap) -> Schedule {
        let code_to_id: HashMap<&str, ActivityId> = self
            .activities
            .iter()
            .map(|a| (a.code.as_str(), remap.activity(a.id)))
            .collect();

        let wbs = self
            .wbs
            .iter()
            .map(|node| WbsNode {
                id: remap.wbs(node.id),
                parent: node.parent.map(|p| remap.wbs(p)),
                ..node.clone()
            })
            .collect();

        let activities = self
            .activities
            .iter()
            .map(|activity| {
                let predecessors = activity
                    .predecessors
                    .iter()
                    .map(|pred| {
                        let target = match &pred.target {
                            ActivityRef::Id(id) => ActivityRef::Id(remap.activity(*id)),
                            ActivityRef::Code(code) => match code_to_id.get(code.as_str()) {
                                Some(id) => ActivityRef::Id(*id),
                                None => ActivityRef::Code(code.clone()),
                            },
                        };
                        Predecessor {
                            target,
                            ..pred.clone()
                        }
                    })
                    .collect();
                Activity {
                    id: remap.activity(activity.id),
                    wbs: activity.wbs.map(|w| remap.wbs(w)),
                    predecessors,
                    ..activity.clone()
                }
            })
            .collect();

        Schedule {
            id: remap.schedule(self.id),
            wbs,
            activities,
            ..self.clone()
        }
    }
}

/// Identifier remapping tables supplied by the persistence collaborator.
#[derive(Debug, Clone, Default)]
pub struct IdRemap {
    schedules: HashMap<ScheduleId, ScheduleId>,
    wbs: HashMap<WbsId, WbsId>,
    activities: HashMap<ActivityId, ActivityId>,
}

impl IdRemap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_schedule(&mut self, from: ScheduleId, to: ScheduleId) -> &mut Self {
        self.schedules.insert(from, to);
        self
    }

    pub fn map_wbs(&mut self, from: WbsId, to: WbsId) -> &mut Self {
        self.wbs.insert(from, to);
        self
    }

    pub fn map_activity(&mut self, from: ActivityId, to: ActivityId) -> &mut Self {
        self.activities.insert(from, to);
        self
    }

    fn schedule(&self, id: ScheduleId) -> ScheduleId {
        self.schedules.get(&id).copied().unwrap_or(id)
    }

    fn wbs(&self, id: WbsId) -> WbsId {
        self.wbs.get(&id).copied().unwrap_or(id)
    }

    fn activity(&self, id: ActivityId) -> ActivityId {
        self.activities.get(&id).copied().unwrap_or(id)
    }
}

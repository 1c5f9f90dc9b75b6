/// In-memory schedule store
use crate::error::StoreError;
use crate::types::{Course, CourseId, Schedule, ScheduleId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Whether `create_schedule` may reuse an existing name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NamePolicy {
    #[default]
    AllowDuplicates,
    RequireUnique,
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
}

struct CourseList {
    courses: Vec<Course>,
    updated_at: DateTime<Utc>,
}

struct ScheduleEntry {
    name: String,
    created_at: DateTime<Utc>,
    /// Creation order, used to break ties between equal names
    seq: u64,
    courses: Mutex<CourseList>,
}

/// Owns every schedule and the active-schedule pointer.
///
/// Each schedule's course list has its own lock, so the duplicate check and
/// the insert in [`add_course`](Self::add_course) are one atomic step even
/// with concurrent writers. The active schedule is only ever exposed by id
/// or as a fresh snapshot; nothing hands out a long-lived "current" handle.
pub struct ScheduleStore {
    schedules: DashMap<ScheduleId, ScheduleEntry>,
    active: RwLock<Option<ScheduleId>>,
    next_seq: Mutex<u64>,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self {
            schedules: DashMap::new(),
            active: RwLock::new(None),
            next_seq: Mutex::new(0),
        }
    }

    /// Creates an empty schedule and returns its fresh id.
    pub fn create_schedule(&self, name: &str, policy: NamePolicy) -> Result<ScheduleId, StoreError> {
        // Hold the sequence lock across the name check so two RequireUnique
        // creations of the same name cannot both pass it.
        let mut seq = self.next_seq.lock().unwrap_or_else(|e| e.into_inner());

        if policy == NamePolicy::RequireUnique && self.schedules.iter().any(|e| e.name == name) {
            return Err(StoreError::DuplicateName {
                name: name.to_string(),
            });
        }

        let mut id = ScheduleId::generate();
        while self.schedules.contains_key(&id) {
            id = ScheduleId::generate();
        }

        let now = Utc::now();
        *seq += 1;
        self.schedules.insert(
            id.clone(),
            ScheduleEntry {
                name: name.to_string(),
                created_at: now,
                seq: *seq,
                courses: Mutex::new(CourseList {
                    courses: Vec::new(),
                    updated_at: now,
                }),
            },
        );

        info!(schedule_id = %id, name, "Created schedule");
        Ok(id)
    }

    /// Makes the schedule called `name` active.
    ///
    /// If several schedules share the name, the most recently created one wins.
    pub fn switch_schedule(&self, name: &str) -> Result<ScheduleId, StoreError> {
        let id = self
            .schedules
            .iter()
            .filter(|e| e.name == name)
            .max_by_key(|e| e.seq)
            .map(|e| e.key().clone())
            .ok_or_else(|| StoreError::NotFound {
                what: format!("name '{name}'"),
            })?;

        self.set_active(id.clone());
        Ok(id)
    }

    /// Makes the schedule with this id active.
    pub fn switch_to(&self, id: &ScheduleId) -> Result<(), StoreError> {
        if !self.schedules.contains_key(id) {
            return Err(not_found(id));
        }
        self.set_active(id.clone());
        Ok(())
    }

    fn set_active(&self, id: ScheduleId) {
        info!(schedule_id = %id, "Switched active schedule");
        *self.active.write().unwrap_or_else(|e| e.into_inner()) = Some(id);
    }

    /// Id of the active schedule, read at call time.
    pub fn active_schedule_id(&self) -> Option<ScheduleId> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Snapshot of the active schedule, read at call time.
    pub fn active_schedule(&self) -> Option<Schedule> {
        self.schedule(&self.active_schedule_id()?)
    }

    /// Inserts `course` unless a course with the same unique id is already there.
    pub fn add_course(&self, schedule_id: &ScheduleId, course: Course) -> Result<AddOutcome, StoreError> {
        let entry = self.schedules.get(schedule_id).ok_or_else(|| not_found(schedule_id))?;
        let mut list = entry.courses.lock().unwrap_or_else(|e| e.into_inner());

        if list.courses.iter().any(|c| c.unique_id == course.unique_id) {
            debug!(schedule_id = %schedule_id, course = %course.unique_id, "Course already in schedule");
            return Ok(AddOutcome::AlreadyPresent);
        }

        debug!(schedule_id = %schedule_id, course = %course.unique_id, "Adding course");
        list.courses.push(course);
        list.updated_at = Utc::now();
        Ok(AddOutcome::Added)
    }

    /// Removes a course; returns whether it was present.
    pub fn remove_course(&self, schedule_id: &ScheduleId, unique_id: &CourseId) -> Result<bool, StoreError> {
        let entry = self.schedules.get(schedule_id).ok_or_else(|| not_found(schedule_id))?;
        let mut list = entry.courses.lock().unwrap_or_else(|e| e.into_inner());

        let before = list.courses.len();
        list.courses.retain(|c| &c.unique_id != unique_id);
        let removed = list.courses.len() != before;
        if removed {
            list.updated_at = Utc::now();
        }
        Ok(removed)
    }

    /// Snapshot of one schedule.
    pub fn schedule(&self, id: &ScheduleId) -> Option<Schedule> {
        let active = self.active_schedule_id();
        let entry = self.schedules.get(id)?;
        Some(snapshot(id, &entry, active.as_ref() == Some(id)))
    }

    /// Snapshots of all schedules in creation order.
    pub fn schedules(&self) -> Vec<Schedule> {
        let active = self.active_schedule_id();
        let mut entries: Vec<(u64, Schedule)> = self
            .schedules
            .iter()
            .map(|e| {
                let id = e.key();
                (e.seq, snapshot(id, e.value(), active.as_ref() == Some(id)))
            })
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, s)| s).collect()
    }

    pub fn contains(&self, id: &ScheduleId) -> bool {
        self.schedules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot(id: &ScheduleId, entry: &ScheduleEntry, active: bool) -> Schedule {
    let list = entry.courses.lock().unwrap_or_else(|e| e.into_inner());
    Schedule {
        id: id.clone(),
        name: entry.name.clone(),
        courses: list.courses.clone(),
        active,
        created_at: entry.created_at,
        updated_at: list.updated_at,
    }
}

fn not_found(id: &ScheduleId) -> StoreError {
    StoreError::NotFound {
        what: format!("id '{id}'"),
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::datetime::CalendarDate;
use crate::error::ScheduleError;
use crate::task::{Schedule, Task};

/// On-disk shape of one schedule; the id is the key it is stored under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSchedule {
    pub name: String,

    #[serde(rename = "scheduleData", alias = "tasks", default)]
    pub tasks: Vec<Task>,
}

impl StoredSchedule {
    pub fn into_schedule(self, id: String) -> Schedule {
        Schedule {
            id,
            name: self.name,
            tasks: self.tasks,
        }
    }
}

impl From<&Schedule> for StoredSchedule {
    fn from(schedule: &Schedule) -> Self {
        Self {
            name: schedule.name.clone(),
            tasks: schedule.tasks.clone(),
        }
    }
}

/// The persisted record: schedules keyed by id.
pub type StoreDocument = BTreeMap<String, StoredSchedule>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub id: String,
    pub name: String,
    pub task_count: usize,
    pub completed_count: usize,
    pub first_date: Option<CalendarDate>,
    pub last_date: Option<CalendarDate>,
}

impl From<&Schedule> for ScheduleSummary {
    fn from(schedule: &Schedule) -> Self {
        Self {
            id: schedule.id.clone(),
            name: schedule.name.clone(),
            task_count: schedule.tasks.len(),
            completed_count: schedule.tasks.iter().filter(|t| t.completed).count(),
            first_date: schedule.first_date(),
            last_date: schedule.last_date(),
        }
    }
}

/// Persistence boundary for schedules. Missing ids surface as
/// [`ScheduleError::NotFound`] inside the returned error.
pub trait ScheduleStore {
    fn load(&self, id: &str) -> anyhow::Result<Schedule>;
    fn save(&mut self, schedule: &Schedule) -> anyhow::Result<()>;
    fn list(&self) -> anyhow::Result<Vec<ScheduleSummary>>;
    fn remove(&mut self, id: &str) -> anyhow::Result<()>;
}

fn summaries(schedules: impl Iterator<Item = Schedule>) -> Vec<ScheduleSummary> {
    let mut out: Vec<ScheduleSummary> = schedules.map(|s| ScheduleSummary::from(&s)).collect();
    out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    out
}

/// All schedules in a single `schedules.json` under the data directory.
#[derive(Debug)]
pub struct JsonFileStore {
    pub data_dir: PathBuf,
    pub schedules_path: PathBuf,
}

impl JsonFileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let schedules_path = data_dir.join("schedules.json");
        if !schedules_path.exists() {
            fs::write(&schedules_path, "{}\n")?;
        }

        info!(
            data_dir = %data_dir.display(),
            schedules = %schedules_path.display(),
            "opened schedule store"
        );

        Ok(Self {
            data_dir,
            schedules_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_document(&self) -> anyhow::Result<StoreDocument> {
        debug!(file = %self.schedules_path.display(), "loading schedules");
        let raw = fs::read_to_string(&self.schedules_path)
            .with_context(|| format!("failed reading {}", self.schedules_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(StoreDocument::new());
        }
        let document: StoreDocument = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.schedules_path.display()))?;
        for (id, stored) in &document {
            ensure_subjects(&stored.name, &stored.tasks).with_context(|| {
                format!("schedule {id} in {}", self.schedules_path.display())
            })?;
        }
        debug!(count = document.len(), "loaded schedules");
        Ok(document)
    }

    #[tracing::instrument(skip(self, document), fields(count = document.len()))]
    pub fn save_document(&self, document: &StoreDocument) -> anyhow::Result<()> {
        save_json_atomic(&self.schedules_path, document).context("failed to save schedules.json")
    }
}

impl ScheduleStore for JsonFileStore {
    #[tracing::instrument(skip(self))]
    fn load(&self, id: &str) -> anyhow::Result<Schedule> {
        let mut document = self.load_document()?;
        let stored = document
            .remove(id)
            .ok_or_else(|| ScheduleError::NotFound(format!("schedule {id}")))?;
        Ok(stored.into_schedule(id.to_string()))
    }

    #[tracing::instrument(skip(self, schedule), fields(id = %schedule.id))]
    fn save(&mut self, schedule: &Schedule) -> anyhow::Result<()> {
        let mut document = self.load_document()?;
        document.insert(schedule.id.clone(), StoredSchedule::from(schedule));
        self.save_document(&document)
    }

    #[tracing::instrument(skip(self))]
    fn list(&self) -> anyhow::Result<Vec<ScheduleSummary>> {
        let document = self.load_document()?;
        Ok(summaries(
            document
                .into_iter()
                .map(|(id, stored)| stored.into_schedule(id)),
        ))
    }

    #[tracing::instrument(skip(self))]
    fn remove(&mut self, id: &str) -> anyhow::Result<()> {
        let mut document = self.load_document()?;
        if document.remove(id).is_none() {
            return Err(ScheduleError::NotFound(format!("schedule {id}")).into());
        }
        info!(id, remaining = document.len(), "removed schedule");
        self.save_document(&document)
    }
}

/// Keeps schedules in memory; used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    schedules: BTreeMap<String, Schedule>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleStore for MemoryStore {
    fn load(&self, id: &str) -> anyhow::Result<Schedule> {
        self.schedules
            .get(id)
            .cloned()
            .ok_or_else(|| ScheduleError::NotFound(format!("schedule {id}")).into())
    }

    fn save(&mut self, schedule: &Schedule) -> anyhow::Result<()> {
        self.schedules.insert(schedule.id.clone(), schedule.clone());
        Ok(())
    }

    fn list(&self) -> anyhow::Result<Vec<ScheduleSummary>> {
        Ok(summaries(self.schedules.values().cloned()))
    }

    fn remove(&mut self, id: &str) -> anyhow::Result<()> {
        self.schedules
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ScheduleError::NotFound(format!("schedule {id}")).into())
    }
}

/// Serialises one schedule as a store record (`{ "<id>": { ... } }`).
pub fn export_schedule(schedule: &Schedule) -> anyhow::Result<String> {
    let mut document = StoreDocument::new();
    document.insert(schedule.id.clone(), StoredSchedule::from(schedule));
    serde_json::to_string_pretty(&document).context("failed to serialise schedule")
}

#[derive(Debug, Deserialize)]
struct ImportRecord {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(rename = "scheduleData", alias = "tasks", default)]
    tasks: Vec<Task>,
}

impl ImportRecord {
    fn into_schedule(self) -> Schedule {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Schedule {
            id,
            name: self.name,
            tasks: self.tasks,
        }
    }
}

/// Accepts a single record, an array of records, or a full store document.
#[tracing::instrument(skip(text))]
pub fn parse_import(text: &str) -> anyhow::Result<Vec<Schedule>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("import: empty input"));
    }

    let value: Value = serde_json::from_str(trimmed).context("failed parsing import JSON")?;
    let is_record = value.get("name").is_some_and(Value::is_string);
    let schedules: Vec<Schedule> = match value {
        Value::Array(_) => serde_json::from_value::<Vec<ImportRecord>>(value)
            .context("failed parsing schedule records")?
            .into_iter()
            .map(ImportRecord::into_schedule)
            .collect(),
        Value::Object(_) if is_record => {
            let record = serde_json::from_value::<ImportRecord>(value)
                .context("failed parsing schedule record")?;
            vec![record.into_schedule()]
        }
        other => serde_json::from_value::<StoreDocument>(other)
            .context("failed parsing schedule document")?
            .into_iter()
            .map(|(id, stored)| stored.into_schedule(id))
            .collect(),
    };

    for schedule in &schedules {
        ensure_subjects(&schedule.name, &schedule.tasks).context("import")?;
    }

    debug!(count = schedules.len(), "parsed import");
    Ok(schedules)
}

/// Every task needs a non-blank subject.
fn ensure_subjects(name: &str, tasks: &[Task]) -> anyhow::Result<()> {
    if let Some(pos) = tasks.iter().position(|t| t.subject.trim().is_empty()) {
        return Err(anyhow!(
            "schedule {name:?} task {} has an empty subject",
            pos + 1
        ));
    }
    Ok(())
}

#[tracing::instrument(skip(path, document))]
fn save_json_atomic(path: &Path, document: &StoreDocument) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = document.len(), "saving json atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, document)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

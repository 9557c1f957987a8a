use std::{ops::Deref, sync::Arc};

use chrono::{DateTime, Local, Utc};
use eyre::{Error, Result};
use log::warn;
use model::{
    lesson::{
        duration_in_bounds, Filter, Lesson, LessonStatus, Location, Recipient, MAX_DURATION_MIN,
        MIN_DURATION_MIN,
    },
    recurrence::Recurrence,
    session::Session,
    slot::Slot,
};
use mongodb::bson::oid::ObjectId;
use storage::{directory::DirectoryStore, lesson::LessonStore};
use thiserror::Error;
use tx_macro::tx;

use crate::notify::Notifier;

/// Typed booking request. Field resolution and parsing happen at the
/// boundary; by the time a request reaches the scheduler it is already
/// structured.
pub struct LessonRequest {
    pub teacher: ObjectId,
    pub recipient: Option<Recipient>,
    pub start_at: DateTime<Local>,
    pub duration_min: u32,
    pub location: Location,
    pub subject: Option<ObjectId>,
    pub notes: String,
    pub recurrence: Option<Recurrence>,
}

impl LessonRequest {
    /// Pure checks, run before any store access.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        if !duration_in_bounds(self.duration_min) {
            return Err(ScheduleError::InvalidDuration(self.duration_min));
        }
        if let Some(rule) = &self.recurrence {
            if rule.occurrences(self.start_at).next().is_none() {
                return Err(ScheduleError::EmptyRecurrence);
            }
        }
        Ok(())
    }

    fn occurrence_starts(&self) -> Vec<DateTime<Local>> {
        match &self.recurrence {
            Some(rule) => rule.occurrences(self.start_at).collect(),
            None => vec![self.start_at],
        }
    }

    fn slot_at(&self, start: DateTime<Local>) -> Slot {
        Slot::new(start.with_timezone(&Utc), self.duration_min)
    }
}

#[derive(Clone)]
pub struct Schedule {
    lessons: LessonStore,
    directory: DirectoryStore,
    notifier: Arc<dyn Notifier>,
}

impl Schedule {
    pub(crate) fn new(
        lessons: LessonStore,
        directory: DirectoryStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Schedule {
            lessons,
            directory,
            notifier,
        }
    }

    /// Books one lesson, or a whole series when the request carries a
    /// recurrence rule. Returns the created identifiers in occurrence order.
    /// A series is all-or-nothing: every occurrence is conflict-checked
    /// before the first insert, and the checks and inserts share one
    /// transaction.
    pub async fn schedule_lesson(
        &self,
        session: &mut Session,
        request: LessonRequest,
    ) -> Result<Vec<ObjectId>, ScheduleError> {
        request.validate()?;
        let created = self.create_lessons(session, &request).await?;

        if let Err(err) = self.notify_created(session, &created).await {
            warn!("Failed to send scheduling notification: {:#}", err);
        }

        Ok(created.into_iter().map(|lesson| lesson.id).collect())
    }

    #[tx]
    async fn create_lessons(
        &self,
        session: &mut Session,
        request: &LessonRequest,
    ) -> Result<Vec<Lesson>, ScheduleError> {
        let resolved = ResolvedRefs {
            teacher_found: self
                .directory
                .teacher_exists(session, request.teacher)
                .await?,
            recipient_found: match request.recipient {
                Some(Recipient::Student(id)) => self.directory.student_exists(session, id).await?,
                Some(Recipient::Group(id)) => self.directory.group_exists(session, id).await?,
                None => true,
            },
        };

        let mut existing = Vec::new();
        for start in request.occurrence_starts() {
            let overlapping = self
                .lessons
                .find_overlapping(
                    session,
                    request.teacher,
                    request.recipient,
                    request.slot_at(start),
                )
                .await?;
            existing.extend(overlapping);
        }

        let created = plan_lessons(request, resolved, &existing, session.actor())?;
        if let [lesson] = created.as_slice() {
            self.lessons.insert(session, lesson).await?;
        } else {
            self.lessons.insert_many(session, &created).await?;
        }
        Ok(created)
    }

    /// Read-only conflict probe: the first existing lesson whose occupied
    /// interval intersects the slot and which shares the teacher or the
    /// recipient.
    pub async fn check_slot(
        &self,
        session: &mut Session,
        teacher: ObjectId,
        recipient: Option<Recipient>,
        slot: Slot,
    ) -> Result<Option<SlotCollision>, Error> {
        let overlapping = self
            .lessons
            .find_overlapping(session, teacher, recipient, slot)
            .await?;
        Ok(overlapping.into_iter().next().map(SlotCollision))
    }

    async fn notify_created(&self, session: &mut Session, lessons: &[Lesson]) -> Result<()> {
        let first = match lessons.first() {
            Some(lesson) => lesson,
            None => return Ok(()),
        };
        let teacher = self
            .directory
            .get_teacher(session, first.teacher)
            .await?
            .ok_or_else(|| eyre::eyre!("Teacher not found:{:?}", first.teacher))?;
        let student = match first.student {
            Some(id) => self.directory.get_student(session, id).await?,
            None => None,
        };
        self.notifier
            .notify_scheduled(lessons, &teacher, student.as_ref())
            .await
    }

    #[tx]
    pub async fn cancel_lesson(&self, session: &mut Session, id: ObjectId) -> Result<Lesson> {
        let lesson = self
            .lessons
            .get(session, id)
            .await?
            .ok_or_else(|| eyre::eyre!("Lesson not found:{:?}", id))?;
        if !lesson.status(Local::now()).can_be_cancelled() {
            return Err(eyre::eyre!("Lesson is already completed"));
        }
        self.lessons.delete(session, id).await?;
        Ok(lesson)
    }

    /// Cancels every remaining uncompleted occurrence of a series. Accepts
    /// any occurrence and resolves it to the series root.
    #[tx]
    pub async fn cancel_series(&self, session: &mut Session, id: ObjectId) -> Result<u64> {
        let lesson = self
            .lessons
            .get(session, id)
            .await?
            .ok_or_else(|| eyre::eyre!("Lesson not found:{:?}", id))?;
        if lesson.recurrence.is_none() {
            return Err(eyre::eyre!("Lesson is not recurring:{:?}", id));
        }
        let root = lesson.series_root.unwrap_or(lesson.id);
        self.lessons.delete_series(session, root).await
    }

    #[tx]
    pub async fn mark_completed(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        let lesson = self
            .lessons
            .get(session, id)
            .await?
            .ok_or_else(|| eyre::eyre!("Lesson not found:{:?}", id))?;
        let status = lesson.status(Local::now());
        if !status.can_be_completed() {
            return Err(match status {
                LessonStatus::Completed => eyre::eyre!("Lesson is already completed"),
                _ => eyre::eyre!("Lesson has not finished yet"),
            });
        }
        self.lessons.set_completed(session, id).await
    }

    pub async fn get_lesson(&self, session: &mut Session, id: ObjectId) -> Result<Option<Lesson>> {
        self.lessons.get(session, id).await
    }

    pub async fn find_in_range(
        &self,
        session: &mut Session,
        filter: Option<Filter>,
        from: Option<DateTime<Local>>,
        to: Option<DateTime<Local>>,
    ) -> Result<Vec<Lesson>> {
        self.lessons.find_range(session, filter, from, to).await
    }

    pub async fn upcoming(
        &self,
        session: &mut Session,
        filter: Filter,
        limit: usize,
    ) -> Result<Vec<Lesson>> {
        self.lessons.find_upcoming(session, filter, limit).await
    }
}

/// Outcome of the directory lookups a request references.
struct ResolvedRefs {
    teacher_found: bool,
    recipient_found: bool,
}

/// The scheduling decision itself, free of store access. Given a request,
/// its directory resolution and the lessons already occupying the requested
/// slots, either refuses the request or builds the full series to insert,
/// chaining every follow-up occurrence to the first one through
/// `series_root`.
fn plan_lessons(
    request: &LessonRequest,
    resolved: ResolvedRefs,
    existing: &[Lesson],
    created_by: ObjectId,
) -> Result<Vec<Lesson>, ScheduleError> {
    if !resolved.teacher_found {
        return Err(ScheduleError::TeacherNotFound);
    }
    if !resolved.recipient_found {
        return Err(match request.recipient {
            Some(Recipient::Group(_)) => ScheduleError::GroupNotFound,
            _ => ScheduleError::StudentNotFound,
        });
    }

    let starts = request.occurrence_starts();
    if starts.is_empty() {
        return Err(ScheduleError::EmptyRecurrence);
    }
    for start in &starts {
        let slot = request.slot_at(*start);
        let collision = existing.iter().find(|lesson| {
            shares_participant(request, lesson) && lesson.get_slot().has_conflict(&slot)
        });
        if let Some(lesson) = collision {
            return Err(ScheduleError::SlotCollision(SlotCollision(lesson.clone())));
        }
    }

    let template = Lesson::new(
        request.teacher,
        request.recipient,
        request.start_at,
        request.duration_min,
        request.location.clone(),
        request.subject,
        request.notes.clone(),
        created_by,
    );

    match request.recurrence {
        None => Ok(vec![template]),
        Some(rule) => {
            let mut created: Vec<Lesson> = Vec::with_capacity(starts.len());
            for start in starts {
                let series_root = created.first().map(|first| first.id);
                created.push(Lesson::with_occurrence(&template, start, rule, series_root));
            }
            Ok(created)
        }
    }
}

fn shares_participant(request: &LessonRequest, lesson: &Lesson) -> bool {
    if Filter::Teacher(request.teacher).is_match(lesson) {
        return true;
    }
    match request.recipient {
        Some(Recipient::Student(id)) => Filter::Student(id).is_match(lesson),
        Some(Recipient::Group(id)) => Filter::Group(id).is_match(lesson),
        None => false,
    }
}

#[derive(Debug)]
pub struct SlotCollision(Lesson);

impl Deref for SlotCollision {
    type Target = Lesson;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(
        "Duration must be between {min} and {max} minutes, got {0}",
        min = MIN_DURATION_MIN,
        max = MAX_DURATION_MIN
    )]
    InvalidDuration(u32),
    #[error("Teacher not found")]
    TeacherNotFound,
    #[error("Student not found")]
    StudentNotFound,
    #[error("Group not found")]
    GroupNotFound,
    #[error("Recurrence yields no occurrences")]
    EmptyRecurrence,
    #[error("Time slot collision:{0:?}")]
    SlotCollision(SlotCollision),
    #[error("Common error:{0}")]
    Common(#[from] eyre::Error),
}

impl From<mongodb::error::Error> for ScheduleError {
    fn from(e: mongodb::error::Error) -> Self {
        ScheduleError::Common(e.into())
    }
}

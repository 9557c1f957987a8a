use std::fmt;

use chrono::{DateTime, Local, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{recurrence::Recurrence, slot::Slot};

pub const MIN_DURATION_MIN: u32 = 30;
pub const MAX_DURATION_MIN: u32 = 240;

pub fn duration_in_bounds(duration_min: u32) -> bool {
    (MIN_DURATION_MIN..=MAX_DURATION_MIN).contains(&duration_min)
}

/// A lesson is either individual or group-targeted, never both.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Student(ObjectId),
    Group(ObjectId),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    InPerson,
    Online {
        #[serde(default)]
        link: Option<String>,
    },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::InPerson => write!(f, "in person"),
            Location::Online { link: Some(link) } => write!(f, "online ({})", link),
            Location::Online { link: None } => write!(f, "online"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub teacher: ObjectId,
    #[serde(default)]
    pub student: Option<ObjectId>,
    #[serde(default)]
    pub group: Option<ObjectId>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub start_at: DateTime<Utc>,
    pub duration_min: u32,
    // persisted alongside start_at so overlap queries run server-side
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub end_at: DateTime<Utc>,
    pub location: Location,
    #[serde(default)]
    pub subject: Option<ObjectId>,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub series_root: Option<ObjectId>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub notes: String,
    pub created_by: ObjectId,
}

impl Lesson {
    pub fn new(
        teacher: ObjectId,
        recipient: Option<Recipient>,
        start_at: DateTime<Local>,
        duration_min: u32,
        location: Location,
        subject: Option<ObjectId>,
        notes: String,
        created_by: ObjectId,
    ) -> Lesson {
        let (student, group) = match recipient {
            Some(Recipient::Student(id)) => (Some(id), None),
            Some(Recipient::Group(id)) => (None, Some(id)),
            None => (None, None),
        };
        let start_at = start_at.with_timezone(&Utc);

        Lesson {
            id: ObjectId::new(),
            teacher,
            student,
            group,
            start_at,
            duration_min,
            end_at: start_at + chrono::Duration::minutes(duration_min as i64),
            location,
            subject,
            recurrence: None,
            series_root: None,
            completed: false,
            notes,
            created_by,
        }
    }

    /// A fresh occurrence of a recurring series, sharing everything with the
    /// template lesson except the start time and the series linkage.
    pub fn with_occurrence(
        template: &Lesson,
        start_at: DateTime<Local>,
        recurrence: Recurrence,
        series_root: Option<ObjectId>,
    ) -> Lesson {
        let start_at = start_at.with_timezone(&Utc);

        Lesson {
            id: ObjectId::new(),
            teacher: template.teacher,
            student: template.student,
            group: template.group,
            start_at,
            duration_min: template.duration_min,
            end_at: start_at + chrono::Duration::minutes(template.duration_min as i64),
            location: template.location.clone(),
            subject: template.subject,
            recurrence: Some(recurrence),
            series_root,
            completed: false,
            notes: template.notes.clone(),
            created_by: template.created_by,
        }
    }

    pub fn get_slot(&self) -> Slot {
        Slot::new(self.start_at, self.duration_min)
    }

    pub fn recipient(&self) -> Option<Recipient> {
        match (self.student, self.group) {
            (Some(id), _) => Some(Recipient::Student(id)),
            (None, Some(id)) => Some(Recipient::Group(id)),
            (None, None) => None,
        }
    }

    pub fn status(&self, now: DateTime<Local>) -> LessonStatus {
        if self.completed {
            LessonStatus::Completed
        } else if self.get_slot().end_at() <= now {
            LessonStatus::AwaitingConfirmation
        } else if self.get_slot().start_at() <= now {
            LessonStatus::InProgress
        } else {
            LessonStatus::Scheduled
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LessonStatus {
    Scheduled,
    InProgress,
    /// Held time has passed, waiting to be confirmed as held.
    AwaitingConfirmation,
    Completed,
}

impl LessonStatus {
    pub fn can_be_cancelled(&self) -> bool {
        !matches!(self, LessonStatus::Completed)
    }

    pub fn can_be_completed(&self) -> bool {
        matches!(self, LessonStatus::AwaitingConfirmation)
    }
}

/// Participant filter for calendar queries.
#[derive(Debug, Clone, Copy)]
pub enum Filter {
    Teacher(ObjectId),
    Student(ObjectId),
    Group(ObjectId),
}

impl Filter {
    pub fn is_match(&self, lesson: &Lesson) -> bool {
        match self {
            Filter::Teacher(id) => lesson.teacher == *id,
            Filter::Student(id) => lesson.student == Some(*id),
            Filter::Group(id) => lesson.group == Some(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn lesson(recipient: Option<Recipient>) -> Lesson {
        Lesson::new(
            ObjectId::new(),
            recipient,
            Local.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).single().unwrap(),
            90,
            Location::InPerson,
            None,
            String::new(),
            ObjectId::new(),
        )
    }

    #[test]
    fn test_end_at_is_derived() {
        let lesson = lesson(None);
        assert_eq!(
            lesson.end_at,
            lesson.start_at + chrono::Duration::minutes(90)
        );
        assert_eq!(lesson.get_slot().end_at_utc(), lesson.end_at);
    }

    #[test]
    fn test_recipient_exclusivity() {
        let student = ObjectId::new();
        let group = ObjectId::new();

        let individual = lesson(Some(Recipient::Student(student)));
        assert_eq!(individual.student, Some(student));
        assert_eq!(individual.group, None);
        assert_eq!(individual.recipient(), Some(Recipient::Student(student)));

        let for_group = lesson(Some(Recipient::Group(group)));
        assert_eq!(for_group.student, None);
        assert_eq!(for_group.group, Some(group));
        assert_eq!(for_group.recipient(), Some(Recipient::Group(group)));

        assert_eq!(lesson(None).recipient(), None);
    }

    #[test]
    fn test_duration_bounds() {
        assert!(!duration_in_bounds(25));
        assert!(duration_in_bounds(30));
        assert!(duration_in_bounds(240));
        assert!(!duration_in_bounds(241));
    }

    #[test]
    fn test_status_transitions_with_time() {
        let lesson = lesson(None);
        let start = lesson.get_slot().start_at();

        assert_eq!(
            lesson.status(start - chrono::Duration::hours(1)),
            LessonStatus::Scheduled
        );
        assert_eq!(
            lesson.status(start + chrono::Duration::minutes(10)),
            LessonStatus::InProgress
        );
        assert_eq!(
            lesson.status(start + chrono::Duration::minutes(90)),
            LessonStatus::AwaitingConfirmation
        );

        let mut held = lesson;
        held.completed = true;
        assert_eq!(held.status(start), LessonStatus::Completed);
        assert!(!held.status(start).can_be_cancelled());
    }

    #[test]
    fn test_filter_matches() {
        let lesson = lesson(Some(Recipient::Student(ObjectId::new())));

        assert!(Filter::Teacher(lesson.teacher).is_match(&lesson));
        assert!(Filter::Student(lesson.student.unwrap()).is_match(&lesson));
        assert!(!Filter::Group(ObjectId::new()).is_match(&lesson));
        assert!(!Filter::Teacher(ObjectId::new()).is_match(&lesson));
    }
}

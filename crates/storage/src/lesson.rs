use chrono::{DateTime, Local, Utc};
use eyre::Result;
use log::info;
use model::{
    lesson::{Filter, Lesson, Recipient},
    session::Session,
    slot::Slot,
};
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::{FindOptions, IndexOptions},
    Collection, IndexModel,
};

use crate::session::Db;

const COLLECTION: &str = "lessons";

#[derive(Clone)]
pub struct LessonStore {
    pub(crate) store: Collection<Lesson>,
}

impl LessonStore {
    pub(crate) async fn new(db: &Db) -> Result<Self> {
        let lessons = db.collection(COLLECTION);
        lessons
            .create_index(IndexModel::builder().keys(doc! { "start_at": 1 }).build())
            .await?;
        lessons
            .create_index(IndexModel::builder().keys(doc! { "teacher": 1 }).build())
            .await?;
        lessons
            .create_index(IndexModel::builder().keys(doc! { "student": 1 }).build())
            .await?;
        lessons
            .create_index(IndexModel::builder().keys(doc! { "group": 1 }).build())
            .await?;
        lessons
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "series_root": 1 })
                    .options(IndexOptions::builder().sparse(true).build())
                    .build(),
            )
            .await?;

        Ok(LessonStore { store: lessons })
    }

    pub async fn get(&self, session: &mut Session, id: ObjectId) -> Result<Option<Lesson>> {
        Ok(self
            .store
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }

    /// Lessons whose occupied interval intersects the slot and which share
    /// the teacher or the recipient, earliest first. Touching endpoints do
    /// not intersect.
    pub async fn find_overlapping(
        &self,
        session: &mut Session,
        teacher: ObjectId,
        recipient: Option<Recipient>,
        slot: Slot,
    ) -> Result<Vec<Lesson>> {
        let mut participants = vec![doc! { "teacher": teacher }];
        match recipient {
            Some(Recipient::Student(id)) => participants.push(doc! { "student": id }),
            Some(Recipient::Group(id)) => participants.push(doc! { "group": id }),
            None => {}
        }

        let filter = doc! {
            "start_at": { "$lt": slot.end_at_utc() },
            "end_at": { "$gt": slot.start_at_utc() },
            "$or": participants,
        };
        let find_options = FindOptions::builder().sort(doc! { "start_at": 1 }).build();
        let mut cursor = self
            .store
            .find(filter)
            .with_options(find_options)
            .session(&mut **session)
            .await?;

        let mut lessons = Vec::new();
        while let Some(lesson) = cursor.next(&mut *session).await {
            lessons.push(lesson?);
        }
        Ok(lessons)
    }

    pub async fn insert(&self, session: &mut Session, lesson: &Lesson) -> Result<()> {
        info!("Add lesson: {:?}", lesson.get_slot());
        self.store
            .insert_one(lesson)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn insert_many(&self, session: &mut Session, lessons: &[Lesson]) -> Result<()> {
        info!("Add {} lessons", lessons.len());
        self.store
            .insert_many(lessons)
            .session(&mut **session)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        info!("Delete lesson: {:?}", id);
        let result = self
            .store
            .delete_one(doc! { "_id": id })
            .session(&mut **session)
            .await?;
        if result.deleted_count != 1 {
            return Err(eyre::eyre!("Lesson not found:{:?}", id));
        }
        Ok(())
    }

    /// Removes every uncompleted occurrence of a series, the root included.
    pub async fn delete_series(&self, session: &mut Session, root: ObjectId) -> Result<u64> {
        info!("Delete series: {:?}", root);
        let filter = doc! {
            "completed": false,
            "$or": [ { "_id": root }, { "series_root": root } ],
        };
        let result = self
            .store
            .delete_many(filter)
            .session(&mut **session)
            .await?;
        Ok(result.deleted_count)
    }

    pub async fn set_completed(&self, session: &mut Session, id: ObjectId) -> Result<()> {
        info!("Set completed: {:?}", id);
        let result = self
            .store
            .update_one(doc! { "_id": id }, doc! { "$set": { "completed": true } })
            .session(&mut **session)
            .await?;
        if result.modified_count != 1 {
            return Err(eyre::eyre!("Lesson not found:{:?}", id));
        }
        Ok(())
    }

    pub async fn find_range(
        &self,
        session: &mut Session,
        filter: Option<Filter>,
        from: Option<DateTime<Local>>,
        to: Option<DateTime<Local>>,
    ) -> Result<Vec<Lesson>> {
        let mut find = match filter {
            Some(filter) => participant_filter(filter),
            None => doc! {},
        };
        match (from, to) {
            (Some(from), Some(to)) => {
                find.insert(
                    "start_at",
                    doc! { "$gte": from.with_timezone(&Utc), "$lt": to.with_timezone(&Utc) },
                );
            }
            (Some(from), None) => {
                find.insert("start_at", doc! { "$gte": from.with_timezone(&Utc) });
            }
            (None, Some(to)) => {
                find.insert("start_at", doc! { "$lt": to.with_timezone(&Utc) });
            }
            (None, None) => {}
        }

        let find_options = FindOptions::builder().sort(doc! { "start_at": 1 }).build();
        let mut cursor = self
            .store
            .find(find)
            .with_options(find_options)
            .session(&mut **session)
            .await?;

        let mut lessons = Vec::new();
        while let Some(lesson) = cursor.next(&mut *session).await {
            lessons.push(lesson?);
        }
        Ok(lessons)
    }

    pub async fn find_upcoming(
        &self,
        session: &mut Session,
        filter: Filter,
        limit: usize,
    ) -> Result<Vec<Lesson>> {
        let mut find = participant_filter(filter);
        find.insert("start_at", doc! { "$gte": Utc::now() });

        let find_options = FindOptions::builder()
            .sort(doc! { "start_at": 1 })
            .limit(limit as i64)
            .build();
        let mut cursor = self
            .store
            .find(find)
            .with_options(find_options)
            .session(&mut **session)
            .await?;

        let mut lessons = Vec::new();
        while let Some(lesson) = cursor.next(&mut *session).await {
            lessons.push(lesson?);
        }
        Ok(lessons)
    }
}

fn participant_filter(filter: Filter) -> bson::Document {
    match filter {
        Filter::Teacher(id) => doc! { "teacher": id },
        Filter::Student(id) => doc! { "student": id },
        Filter::Group(id) => doc! { "group": id },
    }
}

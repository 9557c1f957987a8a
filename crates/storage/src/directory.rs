use eyre::Result;
use model::{
    participant::{Group, Student, Teacher},
    session::Session,
};
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::session::Db;

const TEACHERS: &str = "teachers";
const STUDENTS: &str = "students";
const GROUPS: &str = "groups";

/// Read side of the participant registry. Registration and profile edits
/// belong to the surrounding application; the scheduler only resolves
/// references and notification addresses.
#[derive(Clone)]
pub struct DirectoryStore {
    teachers: Collection<Teacher>,
    students: Collection<Student>,
    groups: Collection<Group>,
}

impl DirectoryStore {
    pub(crate) async fn new(db: &Db) -> Result<Self> {
        let teachers: Collection<Teacher> = db.collection(TEACHERS);
        let students: Collection<Student> = db.collection(STUDENTS);
        let groups: Collection<Group> = db.collection(GROUPS);

        teachers
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;
        students
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).sparse(true).build())
                    .build(),
            )
            .await?;

        Ok(DirectoryStore {
            teachers,
            students,
            groups,
        })
    }

    pub async fn get_teacher(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<Teacher>> {
        Ok(self
            .teachers
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }

    pub async fn get_student(
        &self,
        session: &mut Session,
        id: ObjectId,
    ) -> Result<Option<Student>> {
        Ok(self
            .students
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }

    pub async fn get_group(&self, session: &mut Session, id: ObjectId) -> Result<Option<Group>> {
        Ok(self
            .groups
            .find_one(doc! { "_id": id })
            .session(&mut **session)
            .await?)
    }

    pub async fn teacher_exists(&self, session: &mut Session, id: ObjectId) -> Result<bool> {
        Ok(self.get_teacher(session, id).await?.is_some())
    }

    pub async fn student_exists(&self, session: &mut Session, id: ObjectId) -> Result<bool> {
        Ok(self.get_student(session, id).await?.is_some())
    }

    pub async fn group_exists(&self, session: &mut Session, id: ObjectId) -> Result<bool> {
        Ok(self.get_group(session, id).await?.is_some())
    }
}

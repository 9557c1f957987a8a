pub mod directory;
pub mod lesson;
pub mod session;

use eyre::Result;
use session::Db;

const DB_NAME: &str = "agenda_db";

#[derive(Clone)]
pub struct Storage {
    pub db: Db,
    pub lessons: lesson::LessonStore,
    pub directory: directory::DirectoryStore,
}

impl Storage {
    pub async fn new(uri: &str) -> Result<Self> {
        let db = Db::new(uri, DB_NAME).await?;
        let lessons = lesson::LessonStore::new(&db).await?;
        let directory = directory::DirectoryStore::new(&db).await?;

        Ok(Storage {
            db,
            lessons,
            directory,
        })
    }
}

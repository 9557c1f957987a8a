use std::sync::Arc;

use notify::Notifier;
use service::schedule::Schedule;
use storage::{session::Db, Storage};

pub mod notify;
pub mod service;

#[derive(Clone)]
pub struct Agenda {
    pub db: Db,
    pub schedule: Schedule,
}

impl Agenda {
    pub fn new(storage: Storage, notifier: Arc<dyn Notifier>) -> Self {
        let schedule = Schedule::new(storage.lessons, storage.directory, notifier);
        Agenda {
            db: storage.db,
            schedule,
        }
    }
}

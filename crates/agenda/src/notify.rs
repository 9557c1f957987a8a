use async_trait::async_trait;
use eyre::Error;
use log::info;
use model::{
    lesson::Lesson,
    participant::{Student, Teacher},
};

/// Fire-and-forget collaborator invoked after a scheduling commit.
/// Failures are logged by the caller and never roll anything back.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_scheduled(
        &self,
        lessons: &[Lesson],
        teacher: &Teacher,
        student: Option<&Student>,
    ) -> Result<(), Error>;
}

/// Default notifier: writes the message to the log. A mail or messenger
/// backend plugs in behind the same trait.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_scheduled(
        &self,
        lessons: &[Lesson],
        teacher: &Teacher,
        student: Option<&Student>,
    ) -> Result<(), Error> {
        let first = lessons
            .first()
            .ok_or_else(|| eyre::eyre!("Nothing to notify about"))?;
        let recipient = student.map(|s| s.name.as_str()).unwrap_or("group");
        info!(
            "Scheduled {} lesson(s) for {} with {} starting {:?}, {}",
            lessons.len(),
            recipient,
            teacher.name,
            first.get_slot(),
            first.location,
        );
        Ok(())
    }
}

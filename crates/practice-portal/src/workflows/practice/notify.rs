use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::domain::{ApplicationId, ApplicationStatus, StudentId};

/// Payload handed to the e-mail collaborator after a committed status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeNotice {
    pub application_id: ApplicationId,
    pub student_email: String,
    pub student_name: String,
    pub application_summary: String,
    pub new_status: ApplicationStatus,
    pub comments: Option<String>,
}

/// Outbound notification hook (e-mail, push, ...). Delivery is best effort.
pub trait NotificationService: Send + Sync {
    fn notify_status_change(&self, notice: StatusChangeNotice) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification queue closed")]
    QueueClosed,
}

/// Contact details owned by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentContact {
    pub email: String,
    pub display_name: String,
}

pub trait StudentDirectory: Send + Sync {
    fn contact(&self, student_id: &StudentId) -> Option<StudentContact>;
}

/// Hands notices to a background task so callers never wait on the transport.
///
/// Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct QueuedNotifier {
    sender: mpsc::UnboundedSender<StatusChangeNotice>,
}

impl QueuedNotifier {
    pub fn spawn<N>(transport: Arc<N>) -> (Self, JoinHandle<()>)
    where
        N: NotificationService + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<StatusChangeNotice>();
        let worker = tokio::spawn(async move {
            while let Some(notice) = receiver.recv().await {
                let application_id = notice.application_id.clone();
                match transport.notify_status_change(notice) {
                    Ok(()) => debug!(%application_id, "status change notification delivered"),
                    Err(err) => warn!(
                        %application_id,
                        error = %err,
                        "status change notification failed"
                    ),
                }
            }
        });
        (Self { sender }, worker)
    }
}

impl NotificationService for QueuedNotifier {
    fn notify_status_change(&self, notice: StatusChangeNotice) -> Result<(), NotificationError> {
        self.sender
            .send(notice)
            .map_err(|_| NotificationError::QueueClosed)
    }
}

use crate::domain::model::DomainEvent;
use crate::domain::ports::NotificationSink;
use crate::utils::error::{RegistryError, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Writes every event to the log. Stands in for the email/report listeners.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, event: DomainEvent) -> Result<()> {
        match &event {
            DomainEvent::CourseFull {
                course_id,
                course_name,
                enrolled_students,
            } => {
                tracing::info!(
                    course_id,
                    course_name = %course_name,
                    enrolled_students,
                    "Course max capacity reached"
                );
            }
            DomainEvent::StudentRegistered {
                student_id,
                name,
                email,
            } => {
                tracing::info!(
                    student_id,
                    student_name = %name,
                    student_email = %email,
                    "Welcome, {}! Thanks for registering.",
                    name
                );
            }
        }
        Ok(())
    }
}

/// Hands events to a background task so `notify` never waits on delivery.
///
/// The queue is bounded; when it is full or the worker is gone, the event is
/// rejected and the caller decides whether to log it.
#[derive(Debug, Clone)]
pub struct QueuedSink {
    tx: mpsc::Sender<DomainEvent>,
}

impl QueuedSink {
    /// Must be called from inside a tokio runtime.
    pub fn spawn<S>(inner: S, capacity: usize) -> (Self, JoinHandle<()>)
    where
        S: NotificationSink + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<DomainEvent>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let name = event.name();
                if let Err(e) = inner.notify(event).await {
                    tracing::warn!(event = name, error = %e, "Notification delivery failed");
                }
            }
            tracing::debug!("Notification queue closed");
        });
        (Self { tx }, worker)
    }
}

#[async_trait]
impl NotificationSink for QueuedSink {
    async fn notify(&self, event: DomainEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "queue closed",
            };
            RegistryError::Notification {
                message: reason.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<DomainEvent>>>,
    }

    #[async_trait]
    impl NotificationSink for Recorder {
        async fn notify(&self, event: DomainEvent) -> Result<()> {
            self.seen.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn full_event() -> DomainEvent {
        DomainEvent::CourseFull {
            course_id: 1,
            course_name: "Algorithms".to_string(),
            enrolled_students: 3,
        }
    }

    #[test]
    fn test_tracing_sink_accepts_every_event() {
        let sink = TracingSink;
        tokio_test::block_on(async {
            assert!(sink.notify(full_event()).await.is_ok());
            assert!(sink
                .notify(DomainEvent::StudentRegistered {
                    student_id: 1,
                    name: "Ada".to_string(),
                    email: "ada@example.com".to_string(),
                })
                .await
                .is_ok());
        });
    }

    #[tokio::test]
    async fn test_queued_sink_delivers_in_background() {
        let recorder = Recorder::default();
        let (sink, worker) = QueuedSink::spawn(recorder.clone(), 4);

        sink.notify(full_event()).await.unwrap();
        drop(sink);
        worker.await.unwrap();

        assert_eq!(recorder.seen.lock().unwrap().as_slice(), &[full_event()]);
    }

    #[tokio::test]
    async fn test_queued_sink_reports_closed_queue() {
        let (sink, worker) = QueuedSink::spawn(Recorder::default(), 1);
        worker.abort();
        let _ = worker.await;

        let err = sink.notify(full_event()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Notification { .. }));
    }
}

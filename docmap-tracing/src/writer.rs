//! Background writer task.

use bson::Document;
use mongodb::Database;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{AppenderError, AppenderResult};

/// Messages from the layer (and the handle) to the writer task.
#[derive(Debug)]
pub enum WriterMessage {
    /// Store a document.
    Insert {
        /// Target collection.
        collection: String,
        /// The rendered event.
        document: Document,
    },
    /// Acknowledge once every earlier message is processed.
    Flush(oneshot::Sender<()>),
    /// Stop after every earlier message is processed.
    Shutdown,
}

/// Sending half shared by the layer and the handle.
pub type WriterSender = mpsc::UnboundedSender<WriterMessage>;

/// Receiving half owned by the writer task.
pub type WriterReceiver = mpsc::UnboundedReceiver<WriterMessage>;

/// Create the channel between the layer and the writer.
pub fn channel() -> (WriterSender, WriterReceiver) {
    mpsc::unbounded_channel()
}

/// Controls the writer task spawned by [`crate::connect`].
#[derive(Debug)]
pub struct AppenderHandle {
    sender: WriterSender,
    task: JoinHandle<()>,
}

impl AppenderHandle {
    /// Spawn the writer task on the current runtime.
    pub fn spawn(database: Database, sender: WriterSender, receiver: WriterReceiver) -> Self {
        let task = tokio::spawn(run(database, receiver));
        Self { sender, task }
    }

    /// Wait until every event logged so far has been written.
    pub async fn flush(&self) -> AppenderResult<()> {
        let (done, wait) = oneshot::channel();
        self.sender
            .send(WriterMessage::Flush(done))
            .map_err(|_| AppenderError::Closed)?;
        wait.await.map_err(|_| AppenderError::Closed)
    }

    /// Write pending events, then stop the writer task.
    pub async fn shutdown(self) -> AppenderResult<()> {
        self.sender
            .send(WriterMessage::Shutdown)
            .map_err(|_| AppenderError::Closed)?;
        self.task.await.map_err(|_| AppenderError::Closed)
    }
}

async fn run(database: Database, mut receiver: WriterReceiver) {
    debug!(database = %database.name(), "Log writer started");

    while let Some(message) = receiver.recv().await {
        match message {
            WriterMessage::Insert {
                collection,
                document,
            } => {
                let result = database
                    .collection::<Document>(&collection)
                    .insert_one(document, None)
                    .await;
                if let Err(e) = result {
                    warn!(collection = %collection, error = %e, "Failed to write log event");
                }
            }
            WriterMessage::Flush(done) => {
                let _ = done.send(());
            }
            WriterMessage::Shutdown => break,
        }
    }

    debug!("Log writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn database() -> Database {
        mongodb::Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap()
            .database("log4net")
    }

    #[tokio::test]
    async fn test_flush_and_shutdown() {
        let (sender, receiver) = channel();
        let handle = AppenderHandle::spawn(database().await, sender.clone(), receiver);

        handle.flush().await.unwrap();
        handle.shutdown().await.unwrap();

        assert!(sender.send(WriterMessage::Shutdown).is_err());
    }
}

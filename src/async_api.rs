use crate::grid::{Slot, SyncReport};
use crate::positions::Position;
use crate::rendering::{Blob, GridDocument};
use crate::{ClientConfig, CollageClient, Error, Result};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

/// Synchronization result handed back across the worker boundary: the
/// updated slots plus what changed.
pub type SyncOutcome = (Vec<Slot>, SyncReport);

enum Command {
    RefreshGallery(oneshot::Sender<Result<Vec<String>>>),
    Sync(String, Vec<Slot>, bool, oneshot::Sender<Result<SyncOutcome>>),
    SubmitLayout(GridDocument, Vec<Slot>, String, Option<String>, oneshot::Sender<Result<Vec<Position>>>),
    Clear(String, oneshot::Sender<Result<()>>),
    SelectionMode(String, oneshot::Sender<Result<serde_json::Value>>),
    NewSelection(String, u32, oneshot::Sender<Result<serde_json::Value>>),
    Export(GridDocument, f32, oneshot::Sender<Result<Blob>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly collage client backed by a dedicated worker thread.
///
/// The worker owns a blocking `CollageClient` and runs commands one at a
/// time in arrival order, so async callers never block their executor and
/// the session state is only ever touched from one thread.
#[derive(Clone)]
pub struct AsyncCollageClient {
    cmd_tx: Sender<Command>,
}

impl AsyncCollageClient {
    /// Spawn the worker and build the HTTP client on it.
    pub async fn new(config: Option<ClientConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::spawn(move || {
            let mut client = match CollageClient::new(config) {
                Ok(c) => c,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::RefreshGallery(resp) => {
                        let res = client
                            .refresh_gallery()
                            .map(|_| client.state().photo_urls().to_vec());
                        let _ = resp.send(res);
                    }
                    Command::Sync(component, mut slots, scale, resp) => {
                        let res = if scale {
                            client.update_collage_items(&component, &mut slots)
                        } else {
                            client.sync_grid(&component, &mut slots)
                        };
                        let _ = resp.send(res.map(|report| (slots, report)));
                    }
                    Command::SubmitLayout(doc, slots, component, prompt, resp) => {
                        let res = client.submit_layout(&doc, &slots, &component, prompt.as_deref());
                        let _ = resp.send(res);
                    }
                    Command::Clear(component, resp) => {
                        let _ = resp.send(client.clear_collage(&component));
                    }
                    Command::SelectionMode(mode, resp) => {
                        let _ = resp.send(client.update_selection_mode(&mode));
                    }
                    Command::NewSelection(component, target, resp) => {
                        let _ = resp.send(client.new_selection(&component, target));
                    }
                    Command::Export(mut doc, scale, resp) => {
                        let _ = resp.send(client.export_collage(&mut doc, scale));
                    }
                    Command::Close(resp) => {
                        client.close();
                        let _ = resp.send(Ok(()));
                        break;
                    }
                }
            }
        });

        init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    async fn request<T>(&self, what: &str, make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .map_err(|_| Error::Other(format!("{} failed: client worker has shut down", what)))?;
        rx.await
            .map_err(|e| Error::Other(format!("{} canceled: {}", what, e)))?
    }

    /// Reload the gallery; returns the image URLs now held by the session.
    pub async fn refresh_gallery(&self) -> Result<Vec<String>> {
        self.request("RefreshGallery", Command::RefreshGallery).await
    }

    pub async fn sync_grid(&self, component_name: &str, slots: Vec<Slot>) -> Result<SyncOutcome> {
        self.request("Sync", |tx| Command::Sync(component_name.to_string(), slots, false, tx))
            .await
    }

    pub async fn update_collage_items(&self, component_name: &str, slots: Vec<Slot>) -> Result<SyncOutcome> {
        self.request("Sync", |tx| Command::Sync(component_name.to_string(), slots, true, tx))
            .await
    }

    pub async fn submit_layout(
        &self,
        doc: GridDocument,
        slots: Vec<Slot>,
        component_name: &str,
        user_prompt: Option<&str>,
    ) -> Result<Vec<Position>> {
        let prompt = user_prompt.map(|s| s.to_string());
        self.request("SubmitLayout", |tx| {
            Command::SubmitLayout(doc, slots, component_name.to_string(), prompt, tx)
        })
        .await
    }

    pub async fn clear_collage(&self, component_name: &str) -> Result<()> {
        self.request("Clear", |tx| Command::Clear(component_name.to_string(), tx)).await
    }

    pub async fn update_selection_mode(&self, new_mode: &str) -> Result<serde_json::Value> {
        self.request("SelectionMode", |tx| Command::SelectionMode(new_mode.to_string(), tx))
            .await
    }

    pub async fn new_selection(&self, component_name: &str, target_id: u32) -> Result<serde_json::Value> {
        self.request("NewSelection", |tx| {
            Command::NewSelection(component_name.to_string(), target_id, tx)
        })
        .await
    }

    /// Rasterize `doc` with chrome hidden; the document is consumed.
    pub async fn export_collage(&self, doc: GridDocument, scale: f32) -> Result<Blob> {
        self.request("Export", |tx| Command::Export(doc, scale, tx)).await
    }

    /// Shutdown the background worker and end the session.
    pub async fn close(self) -> Result<()> {
        self.request("Close", Command::Close).await
    }
}

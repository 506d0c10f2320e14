//! Fakes and fixtures shared by unit tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::Path as UrlPath;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::oneshot;

use crate::config::NotifyMode;
use crate::fetch::Fetcher;
use crate::pipeline::Pipeline;
use crate::platform::{ChatApi, InboundEvent};
use crate::transcode::{TranscodeEngine, Transcoder};

pub const BOT_ID: &str = "4242";

pub fn event_from(sender: Option<&str>, text: &str) -> InboundEvent {
    InboundEvent {
        chat_id: "-1001".to_string(),
        message_id: "17".to_string(),
        sender_id: sender.map(str::to_string),
        text: text.to_string(),
    }
}

pub fn event_with_text(text: &str) -> InboundEvent {
    event_from(Some("1001"), text)
}

pub fn files_in(dir: &tempfile::TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

/// Serve `GET /<path>` with body `webm:<path>`, or 404 when the path starts with `missing`.
pub async fn serve_clips() -> String {
    async fn clip(UrlPath(path): UrlPath<String>) -> Result<String, StatusCode> {
        let path = path.trim_start_matches('/');
        if path.starts_with("missing") {
            Err(StatusCode::NOT_FOUND)
        } else {
            Ok(format!("webm:{}", path))
        }
    }

    let router = Router::new().route("/{*path}", get(clip));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Answer every request with a 200 that promises more body than it sends,
/// then hang up.
pub async fn serve_truncated() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100000\r\n\r\nwebm:")
                .await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{}", addr)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCall {
    Reaction {
        chat_id: String,
        message_id: String,
        emoji: String,
    },
    Text {
        chat_id: String,
        text: String,
    },
    Upload {
        chat_id: String,
        filename: String,
        bytes: Vec<u8>,
    },
}

/// Records every successful outbound call.
#[derive(Default)]
pub struct RecordingChat {
    calls: Mutex<Vec<ChatCall>>,
    fail_notifications: bool,
    fail_uploads: bool,
    stall_uploads: bool,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_notifications() -> Self {
        Self {
            fail_notifications: true,
            ..Self::default()
        }
    }

    pub fn failing_uploads() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    /// Uploads never complete.
    pub fn stalling_uploads() -> Self {
        Self {
            stall_uploads: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap().clone()
    }

    fn filtered(&self, keep: fn(&ChatCall) -> bool) -> Vec<ChatCall> {
        self.calls().into_iter().filter(|c| keep(c)).collect()
    }

    pub fn reactions(&self) -> Vec<ChatCall> {
        self.filtered(|c| matches!(c, ChatCall::Reaction { .. }))
    }

    pub fn texts(&self) -> Vec<ChatCall> {
        self.filtered(|c| matches!(c, ChatCall::Text { .. }))
    }

    pub fn uploads(&self) -> Vec<ChatCall> {
        self.filtered(|c| matches!(c, ChatCall::Upload { .. }))
    }

    fn record(&self, call: ChatCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn add_reaction(&self, chat_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        if self.fail_notifications {
            anyhow::bail!("reactions are disabled in this chat");
        }
        self.record(ChatCall::Reaction {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        if self.fail_notifications {
            anyhow::bail!("not enough rights to send text messages");
        }
        self.record(ChatCall::Text {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn upload_file(
        &self,
        chat_id: &str,
        mut file: tokio::fs::File,
        filename: &str,
    ) -> Result<()> {
        if self.fail_uploads {
            anyhow::bail!("file too large");
        }
        if self.stall_uploads {
            std::future::pending::<()>().await;
        }
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await?;
        self.record(ChatCall::Upload {
            chat_id: chat_id.to_string(),
            filename: filename.to_string(),
            bytes,
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum EngineBehavior {
    /// Write `mp4:<source bytes>` to the output and report success.
    Produce,
    /// Leave a partial output behind and report an error.
    Fail,
    /// Report success without writing anything.
    ProduceNothing,
    /// Drop the completion signal without sending.
    Vanish,
    /// Never report back.
    Hang,
}

/// Engine double that finishes jobs synchronously according to its behavior.
pub struct FakeEngine {
    behavior: EngineBehavior,
    started: Mutex<Vec<PathBuf>>,
}

impl FakeEngine {
    pub fn new(behavior: EngineBehavior) -> Self {
        Self {
            behavior,
            started: Mutex::new(Vec::new()),
        }
    }

    /// Source paths of every job started so far.
    pub fn started(&self) -> Vec<PathBuf> {
        self.started.lock().unwrap().clone()
    }
}

impl TranscodeEngine for FakeEngine {
    fn start(&self, source: &Path, output: &Path) -> oneshot::Receiver<Result<()>> {
        self.started.lock().unwrap().push(source.to_path_buf());
        let (tx, rx) = oneshot::channel();

        match self.behavior {
            EngineBehavior::Produce => {
                let mut data = b"mp4:".to_vec();
                data.extend(std::fs::read(source).unwrap());
                std::fs::write(output, data).unwrap();
                let _ = tx.send(Ok(()));
            }
            EngineBehavior::Fail => {
                std::fs::write(output, b"partial").unwrap();
                let _ = tx.send(Err(anyhow::anyhow!("encoder crashed")));
            }
            EngineBehavior::ProduceNothing => {
                let _ = tx.send(Ok(()));
            }
            EngineBehavior::Vanish => drop(tx),
            EngineBehavior::Hang => {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    drop(tx);
                });
            }
        }

        rx
    }
}

/// A pipeline writing into `dir`, talking to `chat`, converting with a fake engine.
pub fn test_pipeline(
    dir: &tempfile::TempDir,
    chat: Arc<RecordingChat>,
    behavior: EngineBehavior,
    mode: NotifyMode,
) -> (Pipeline, Arc<FakeEngine>) {
    pipeline_with_upload_timeout(dir, chat, behavior, mode, Duration::from_secs(10))
}

pub fn pipeline_with_upload_timeout(
    dir: &tempfile::TempDir,
    chat: Arc<RecordingChat>,
    behavior: EngineBehavior,
    mode: NotifyMode,
    upload_timeout: Duration,
) -> (Pipeline, Arc<FakeEngine>) {
    let engine = Arc::new(FakeEngine::new(behavior));
    let fetcher = Fetcher::new(dir.path().to_path_buf(), Duration::from_secs(10)).unwrap();
    let transcoder = Transcoder::new(engine.clone(), Duration::from_secs(10));
    let pipeline = Pipeline::new(chat, fetcher, transcoder, mode, upload_timeout);
    (pipeline, engine)
}

//! Live-reload hub
//!
//! Task completions are turned into JSON messages and broadcast to every
//! connected browser. Style outputs are pushed as stylesheet swaps, every
//! other task as a full reload.

use crate::build::progress::{ProgressEvent, ProgressReporter};
use crate::build::{TaskKind, TaskStatus};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

/// URL of the injected client script.
pub const CLIENT_PATH: &str = "/__assetline/reload.js";
/// WebSocket endpoint the client connects to.
pub const SOCKET_PATH: &str = "/__assetline/ws";

/// Browser-side client: swaps stylesheets in place, reloads otherwise, and
/// reconnects after the server restarts.
pub const CLIENT_SCRIPT: &str = r#"(function () {
  var url = (location.protocol === "https:" ? "wss://" : "ws://") + location.host + "/__assetline/ws";
  function refreshSheet(path) {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    var swapped = false;
    for (var i = 0; i < links.length; i++) {
      var href = links[i].getAttribute("href") || "";
      if (href.split("?")[0] === path) {
        links[i].href = path + "?v=" + Date.now();
        swapped = true;
      }
    }
    return swapped;
  }
  function connect() {
    var socket = new WebSocket(url);
    socket.onmessage = function (event) {
      var message = JSON.parse(event.data);
      if (message.type === "css") {
        var all = message.paths.every(refreshSheet);
        if (all) return;
      }
      location.reload();
    };
    socket.onclose = function () {
      setTimeout(connect, 1000);
    };
  }
  connect();
})();
"#;

const CHANNEL_CAPACITY: usize = 64;

/// Message pushed to browsers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadMessage {
    /// Reload the whole page
    Reload { task: String },
    /// Swap the listed stylesheets (URL paths from the site root)
    Css { paths: Vec<String> },
}

impl ReloadMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// URL path of an output file under the served root (`/css/app.css`).
pub fn url_path(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let parts: Vec<String> =
        relative.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    Some(format!("/{}", parts.join("/")))
}

/// Insert the client script tag before `</body>`, or append it.
pub fn inject_client(html: &str) -> String {
    let tag = format!("<script src=\"{}\"></script>", CLIENT_PATH);
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(at) => format!("{}{}\n{}", &html[..at], tag, &html[at..]),
        None => format!("{}{}\n", html, tag),
    }
}

/// Broadcast side of the live-reload channel.
#[derive(Debug, Clone)]
pub struct LiveReload {
    sender: broadcast::Sender<String>,
    /// Output root that URL paths are relative to
    root: PathBuf,
}

impl LiveReload {
    pub fn new(root: PathBuf) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender, root }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Number of connected clients.
    pub fn clients(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Broadcast a message. Returns how many clients received it; having
    /// none is not an error.
    pub fn send(&self, message: &ReloadMessage) -> usize {
        let delivered = self.sender.send(message.to_json()).unwrap_or(0);
        tracing::debug!(clients = delivered, message = %message.to_json(), "live reload");
        delivered
    }

    /// Message for a finished task, if it should notify browsers.
    pub fn message_for(&self, task_id: &str, kind: TaskKind, outputs: &[PathBuf]) -> Option<ReloadMessage> {
        if outputs.is_empty() {
            return None;
        }
        if kind == TaskKind::Styles {
            let paths: Vec<String> = outputs
                .iter()
                .filter(|p| p.extension().is_some_and(|e| e == "css"))
                .filter_map(|p| url_path(&self.root, p))
                .collect();
            if !paths.is_empty() {
                return Some(ReloadMessage::Css { paths });
            }
        }
        Some(ReloadMessage::Reload { task: task_id.to_string() })
    }
}

impl ProgressReporter for LiveReload {
    fn report(&self, event: ProgressEvent) {
        if let ProgressEvent::TaskCompleted { task_id, kind, status: TaskStatus::Success, outputs, .. } =
            event
        {
            if let Some(message) = self.message_for(&task_id, kind, &outputs) {
                self.send(&message);
            }
        }
    }
}

//! # Hot Reload Module
//!
//! Development-mode live reload: a filesystem watcher over the views and
//! static directories that broadcasts a reload request on the built-in
//! `@/hot-reload` channel. Pages rendered through the view collaborator
//! subscribe via the injected `@hotReload` script and reload themselves.
//!
//! Hot reload is development tooling; the server never registers the
//! channel or the watcher in production mode.

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::websocket::{Channel, ChannelBroadcaster};

/// Channel name clients subscribe to for reload requests.
pub const HOT_RELOAD_CHANNEL: &str = "@/hot-reload";

/// The built-in reload channel. No handlers: traffic is one-way,
/// server to page.
pub struct HotReloadChannel;

impl Channel for HotReloadChannel {
    fn name(&self) -> &str {
        HOT_RELOAD_CHANNEL
    }
}

/// Watch the given directories and broadcast a reload request on every
/// modification. Directories that don't exist are skipped.
pub fn watch(
    directories: &[PathBuf],
    broadcaster: ChannelBroadcaster,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) {
                    debug!(paths = ?event.paths, "change detected, requesting reload");
                    broadcaster.broadcast(&json!({}), Some(HOT_RELOAD_CHANNEL));
                }
            }
            Err(e) => warn!(error = %e, "watch error"),
        },
        Config::default(),
    )?;

    for directory in directories {
        if directory.is_dir() {
            watcher.watch(directory, RecursiveMode::Recursive)?;
        }
    }
    Ok(watcher)
}

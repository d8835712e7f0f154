//! Shared helpers: recording host collaborators and fake sync tools
#![allow(dead_code)]

use sitesync::host::{Host, Notifier, OutputSink, StatusIndicator};
use sitesync::{Config, RawSettings, SessionState, WorkspaceContext};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct RecordingOutput {
    pub text: Mutex<String>,
    pub shows: AtomicUsize,
    pub hides: AtomicUsize,
}

impl OutputSink for RecordingOutput {
    fn append(&self, text: &str) {
        self.text.lock().unwrap().push_str(text);
    }

    fn show(&self) {
        self.shows.fetch_add(1, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub infos: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    pub states: Mutex<Vec<SessionState>>,
    pub progress: Mutex<Vec<String>>,
}

impl StatusIndicator for RecordingStatus {
    fn set_state(&self, state: SessionState) {
        self.states.lock().unwrap().push(state);
    }

    fn progress(&self, label: &str) {
        self.progress.lock().unwrap().push(label.to_string());
    }
}

#[derive(Default)]
pub struct Recorder {
    pub output: Arc<RecordingOutput>,
    pub notifier: Arc<RecordingNotifier>,
    pub status: Arc<RecordingStatus>,
}

impl Recorder {
    pub fn host(&self) -> Host {
        Host {
            output: self.output.clone(),
            notifier: self.notifier.clone(),
            status: self.status.clone(),
        }
    }

    pub fn text(&self) -> String {
        self.output.text.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.notifier.errors.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.notifier.infos.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.status.states.lock().unwrap().clone()
    }
}

/// Write an executable shell script standing in for rsync
#[cfg(unix)]
pub fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A fake tool that records its arguments, one line per call, then exits
#[cfg(unix)]
pub fn recording_tool(dir: &Path, name: &str, log: &Path, code: i32) -> PathBuf {
    fake_tool(
        dir,
        name,
        &format!("echo \"$@\" >> '{}'\nexit {code}", log.display()),
    )
}

pub fn invocations(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn build_config(toml: &str, root: &Path) -> Config {
    let raw: RawSettings = toml::from_str(toml).unwrap();
    Config::build(&raw, &WorkspaceContext::new(root)).unwrap()
}

use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::process::Command;

/// Opens a URL in a new browsing context. Failures are silent to the user.
pub trait LinkOpener: Send {
    fn open(&mut self, url: &str);
}

/// Hands URLs to the desktop's default browser via `xdg-open` (or `open`
/// on macOS). Each child is awaited on a background task so it is reaped;
/// a missing browser only logs.
pub struct SystemOpener {
    program: Option<String>,
    in_flight: Arc<AtomicUsize>,
}

impl SystemOpener {
    pub fn new() -> Self {
        let program = Self::detect_program();
        log::info!("[Opener] Using {:?}", program);
        Self {
            program: program.map(str::to_string),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Open URLs with `program` regardless of the desktop.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn detect_program() -> Option<&'static str> {
        if cfg!(target_os = "macos") {
            Some("open")
        } else if std::env::var("WAYLAND_DISPLAY").is_ok() || std::env::var("DISPLAY").is_ok() {
            Some("xdg-open")
        } else {
            None
        }
    }

    /// Children spawned but not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Default for SystemOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkOpener for SystemOpener {
    fn open(&mut self, url: &str) {
        let Some(program) = self.program.clone() else {
            log::warn!("[Opener] No display available, not opening {}", url);
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("[Opener] No async runtime, not opening {}", url);
            return;
        };

        // Spawning a tokio child needs the runtime context.
        let _guard = runtime.enter();
        let mut child = match Command::new(&program)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log::warn!("[Opener] {} failed for {}: {}", program, url, e);
                return;
            }
        };
        log::info!("[Opener] Opened {}", url);

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.clone();
        let url = url.to_string();
        runtime.spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => log::warn!("[Opener] {} exited with {} for {}", program, status, url),
                Err(e) => log::warn!("[Opener] Waiting on {} failed: {}", program, e),
            }
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

/// Remembers every URL instead of opening it. Clones share the record.
#[derive(Debug, Default, Clone)]
pub struct RecordingOpener {
    opened: Arc<Mutex<Vec<String>>>,
}

impl RecordingOpener {
    pub fn urls(&self) -> Vec<String> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl LinkOpener for RecordingOpener {
    fn open(&mut self, url: &str) {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }
    }
}

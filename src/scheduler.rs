//! Background workers for preview rendering and export.
//!
//! Live-preview updates fire on every style-control change, far faster
//! than rendering can keep up. The preview worker consumes a
//! single-value pending slot: submitting replaces whatever is waiting, so
//! bursts of slider changes collapse to the most recent settled value,
//! and renders are throttled to at most one per debounce interval. This
//! is a coalescing policy, not a queue.
//!
//! Export runs on its own worker so a slow source-resolution export never
//! blocks preview interaction. Admission is reject-when-busy: submitting
//! while a job is pending or running fails instead of queueing, which
//! preserves at-most-one-in-flight without a racy boolean flag.
//!
//! Neither worker supports cancellation; a started render or export runs
//! to completion. Style values are snapshotted into the submitted job so
//! the UI thread can keep mutating its own state mid-render.

use crate::constants::PREVIEW_DEBOUNCE_MS;
use crate::error::AquamarkError;
use crate::export::export_to_file;
use crate::fonts::FontCache;
use crate::preview::WatermarkPlacement;
use crate::render::{render_image, render_text};
use crate::style::WatermarkStyle;
use crate::tile::apply_tiling;
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::RgbaImage;
use parking_lot::{Condvar, Mutex};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Everything a preview render needs, captured at submission time.
#[derive(Clone)]
pub struct StyleSnapshot {
    /// The style values as of the triggering change
    pub style: WatermarkStyle,
    /// Decoded source raster for image styles
    pub logo: Option<RgbaImage>,
    /// Preview canvas dimensions, used as the tiling cover area
    pub viewport: (u32, u32),
}

/// Outcome of a preview render.
pub enum PreviewEvent {
    /// A freshly rendered (and tiled, if enabled) watermark raster
    Rendered(RgbaImage),
    /// The render failed; the previous raster stays on screen
    Failed(String),
}

/// Render a snapshot into the raster the preview compositor will show.
///
/// Dispatches to the text or image renderer, then applies tiling over the
/// viewport. This is also the synchronous entry point for headless use.
pub fn render_snapshot(
    snapshot: &StyleSnapshot,
    fonts: &mut FontCache,
) -> Result<RgbaImage, AquamarkError> {
    snapshot.style.validate()?;

    let raster = match &snapshot.style {
        WatermarkStyle::Text(style) => render_text(style, fonts)?,
        WatermarkStyle::Image(style) => {
            let source = snapshot.logo.as_ref().ok_or_else(|| {
                AquamarkError::Render("image style submitted without a decoded logo".to_string())
            })?;
            render_image(source, style)?
        }
    };

    Ok(apply_tiling(
        raster,
        snapshot.style.tile(),
        snapshot.style.tile_gap(),
        snapshot.viewport.0,
        snapshot.viewport.1,
    ))
}

struct PreviewSlot {
    pending: Option<StyleSnapshot>,
    shutdown: bool,
}

struct PreviewShared {
    slot: Mutex<PreviewSlot>,
    signal: Condvar,
}

/// Coalescing preview render worker.
pub struct PreviewScheduler {
    shared: Arc<PreviewShared>,
    worker: Option<JoinHandle<()>>,
}

impl PreviewScheduler {
    /// Spawn the worker. Render outcomes arrive on the returned channel.
    pub fn spawn() -> (Self, Receiver<PreviewEvent>) {
        let (event_tx, event_rx) = unbounded();

        let shared = Arc::new(PreviewShared {
            slot: Mutex::new(PreviewSlot {
                pending: None,
                shutdown: false,
            }),
            signal: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || preview_loop(worker_shared, event_tx));

        (
            Self {
                shared,
                worker: Some(worker),
            },
            event_rx,
        )
    }

    /// Submit a style snapshot, replacing any not-yet-rendered one.
    pub fn submit(&self, snapshot: StyleSnapshot) {
        let mut slot = self.shared.slot.lock();
        if slot.pending.is_some() {
            debug!("preview submission coalesced over a pending one");
        }
        slot.pending = Some(snapshot);
        self.shared.signal.notify_one();
    }
}

impl Drop for PreviewScheduler {
    fn drop(&mut self) {
        {
            let mut slot = self.shared.slot.lock();
            slot.shutdown = true;
            self.shared.signal.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn preview_loop(shared: Arc<PreviewShared>, events: Sender<PreviewEvent>) {
    let mut fonts = FontCache::new();
    let debounce = Duration::from_millis(PREVIEW_DEBOUNCE_MS);
    let mut last_render: Option<Instant> = None;

    loop {
        let mut snapshot = {
            let mut slot = shared.slot.lock();
            loop {
                if slot.shutdown {
                    return;
                }
                if let Some(snapshot) = slot.pending.take() {
                    break snapshot;
                }
                shared.signal.wait(&mut slot);
            }
        };

        // Throttle, then pick up anything newer that arrived while waiting
        if let Some(last) = last_render {
            let since = last.elapsed();
            if since < debounce {
                thread::sleep(debounce - since);

                let mut slot = shared.slot.lock();
                if slot.shutdown {
                    return;
                }
                if let Some(newer) = slot.pending.take() {
                    snapshot = newer;
                }
            }
        }

        last_render = Some(Instant::now());

        let event = match render_snapshot(&snapshot, &mut fonts) {
            Ok(raster) => PreviewEvent::Rendered(raster),
            Err(e) => PreviewEvent::Failed(e.to_string()),
        };

        if events.send(event).is_err() {
            return;
        }
    }
}

/// A full export request, snapshotted at submission time.
pub struct ExportJob {
    /// Original full-resolution background
    pub background: RgbaImage,
    /// Rendered (and tiled) watermark raster in preview space
    pub watermark: RgbaImage,
    /// Watermark center in preview coordinates
    pub anchor: WatermarkPlacement,
    /// Preview-to-source ratio
    pub ratio: f64,
    /// Output file path
    pub output: PathBuf,
}

/// Progress of an export job.
pub enum ExportEvent {
    /// The worker picked up the job
    Started(PathBuf),
    /// The flattened raster was written
    Finished(PathBuf),
    /// The export failed; in-memory state is unaffected and the export
    /// can be retried
    Failed { output: PathBuf, reason: String },
}

struct ExportSlot {
    job: Option<ExportJob>,
    running: bool,
    shutdown: bool,
}

struct ExportShared {
    slot: Mutex<ExportSlot>,
    signal: Condvar,
}

/// Single-worker export scheduler with reject-when-busy admission.
pub struct ExportScheduler {
    shared: Arc<ExportShared>,
    worker: Option<JoinHandle<()>>,
}

impl ExportScheduler {
    /// Spawn the worker. Progress events arrive on the returned channel.
    pub fn spawn() -> (Self, Receiver<ExportEvent>) {
        let (event_tx, event_rx) = unbounded();

        let shared = Arc::new(ExportShared {
            slot: Mutex::new(ExportSlot {
                job: None,
                running: false,
                shutdown: false,
            }),
            signal: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || export_loop(worker_shared, event_tx));

        (
            Self {
                shared,
                worker: Some(worker),
            },
            event_rx,
        )
    }

    /// Submit an export job.
    ///
    /// # Errors
    ///
    /// Returns `AquamarkError::Export` when a job is already pending or
    /// running. The caller retries after the current job's terminal event.
    pub fn begin(&self, job: ExportJob) -> Result<(), AquamarkError> {
        let mut slot = self.shared.slot.lock();

        if slot.running || slot.job.is_some() {
            return Err(AquamarkError::Export(
                "an export is already in progress".to_string(),
            ));
        }

        slot.job = Some(job);
        self.shared.signal.notify_one();
        Ok(())
    }
}

impl Drop for ExportScheduler {
    fn drop(&mut self) {
        {
            let mut slot = self.shared.slot.lock();
            slot.shutdown = true;
            self.shared.signal.notify_one();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn export_loop(shared: Arc<ExportShared>, events: Sender<ExportEvent>) {
    loop {
        let job = {
            let mut slot = shared.slot.lock();
            loop {
                if slot.shutdown {
                    return;
                }
                if let Some(job) = slot.job.take() {
                    slot.running = true;
                    break job;
                }
                shared.signal.wait(&mut slot);
            }
        };

        let _ = events.send(ExportEvent::Started(job.output.clone()));

        let result = export_to_file(
            &job.background,
            &job.watermark,
            job.anchor,
            job.ratio,
            &job.output,
        );

        {
            let mut slot = shared.slot.lock();
            slot.running = false;
        }

        let event = match result {
            Ok(()) => ExportEvent::Finished(job.output),
            Err(e) => {
                error!(output = %job.output.display(), error = %e, "export failed");
                ExportEvent::Failed {
                    output: job.output,
                    reason: e.to_string(),
                }
            }
        };

        if events.send(event).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::alpha_from_opacity;
    use crate::style::{TextStyle, TileMode};
    use image::Rgba;

    fn text_snapshot(opacity: u8) -> StyleSnapshot {
        StyleSnapshot {
            style: WatermarkStyle::Text(TextStyle {
                text: "Mark".to_string(),
                opacity,
                ..TextStyle::default()
            }),
            logo: None,
            viewport: (800, 640),
        }
    }

    fn recv(events: &Receiver<PreviewEvent>) -> PreviewEvent {
        events
            .recv_timeout(Duration::from_secs(10))
            .expect("preview worker should emit an event")
    }

    // Test: A submitted snapshot renders and the raster comes back
    #[test]
    fn test_preview_renders_snapshot() {
        let (scheduler, events) = PreviewScheduler::spawn();
        scheduler.submit(text_snapshot(80));

        match recv(&events) {
            PreviewEvent::Rendered(raster) => {
                assert!(raster.width() > 0 && raster.height() > 0);
                let max_alpha = raster.pixels().map(|p| p[3]).max().unwrap();
                let target = alpha_from_opacity(80);
                assert!(max_alpha <= target && max_alpha >= target - 3);
            }
            PreviewEvent::Failed(reason) => panic!("render failed: {}", reason),
        }
    }

    // Test: A burst of submissions collapses to the most recent value
    #[test]
    fn test_preview_coalesces_burst() {
        let (scheduler, events) = PreviewScheduler::spawn();

        for opacity in [20, 30, 40, 50, 60, 70, 80, 90] {
            scheduler.submit(text_snapshot(opacity));
        }

        // Collect until the final value has been rendered
        let target = alpha_from_opacity(90);
        let mut rendered = 0usize;
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut saw_final = false;
        while Instant::now() < deadline {
            match events.recv_timeout(Duration::from_secs(2)) {
                Ok(PreviewEvent::Rendered(raster)) => {
                    rendered += 1;
                    let max_alpha = raster.pixels().map(|p| p[3]).max().unwrap();
                    if max_alpha <= target && max_alpha >= target - 3 {
                        saw_final = true;
                        break;
                    }
                }
                Ok(PreviewEvent::Failed(reason)) => panic!("render failed: {}", reason),
                Err(_) => break,
            }
        }

        assert!(saw_final, "the last submitted value must be rendered");
        assert!(
            rendered < 8,
            "8 rapid submissions must coalesce, got {} renders",
            rendered
        );
    }

    // Test: Invalid snapshots surface as Failed events
    #[test]
    fn test_preview_invalid_style_fails() {
        let (scheduler, events) = PreviewScheduler::spawn();
        scheduler.submit(text_snapshot(0));

        match recv(&events) {
            PreviewEvent::Failed(reason) => assert!(reason.contains("opacity")),
            PreviewEvent::Rendered(_) => panic!("opacity 0 must not render"),
        }
    }

    // Test: Image snapshot without a logo raster fails, not panics
    #[test]
    fn test_preview_image_without_logo_fails() {
        let snapshot = StyleSnapshot {
            style: WatermarkStyle::Image(crate::style::ImageStyle {
                source: PathBuf::from("logo.png"),
                size: 1.0,
                opacity: 100,
                rotation: 0,
                tile: TileMode::Single,
                tile_gap: 50,
            }),
            logo: None,
            viewport: (800, 640),
        };

        let (scheduler, events) = PreviewScheduler::spawn();
        scheduler.submit(snapshot);

        assert!(matches!(recv(&events), PreviewEvent::Failed(_)));
    }

    fn export_job(dir: &std::path::Path, name: &str, side: u32) -> ExportJob {
        ExportJob {
            background: RgbaImage::from_pixel(side, side, Rgba([40, 40, 40, 255])),
            watermark: RgbaImage::from_pixel(30, 30, Rgba([255, 0, 0, 255])),
            anchor: WatermarkPlacement::new(side as i32 / 2, side as i32 / 2),
            ratio: 1.0,
            output: dir.join(name),
        }
    }

    // Test: Export emits Started then Finished and writes the file
    #[test]
    fn test_export_completes() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, events) = ExportScheduler::spawn();

        let output = dir.path().join("out.png");
        scheduler.begin(export_job(dir.path(), "out.png", 100)).unwrap();

        match events.recv_timeout(Duration::from_secs(10)).unwrap() {
            ExportEvent::Started(path) => assert_eq!(path, output),
            _ => panic!("expected Started first"),
        }
        match events.recv_timeout(Duration::from_secs(10)).unwrap() {
            ExportEvent::Finished(path) => assert_eq!(path, output),
            ExportEvent::Failed { reason, .. } => panic!("export failed: {}", reason),
            _ => panic!("expected a terminal event"),
        }

        assert!(output.exists());
    }

    // Test: Submission while a job is in flight is rejected, and accepted
    // again after the terminal event
    #[test]
    fn test_export_busy_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, events) = ExportScheduler::spawn();

        scheduler
            .begin(export_job(dir.path(), "first.png", 800))
            .unwrap();

        // The first job is pending or running either way
        let second = scheduler.begin(export_job(dir.path(), "second.png", 100));
        assert!(matches!(second, Err(AquamarkError::Export(_))));

        // Drain to the terminal event, then admission reopens
        loop {
            match events.recv_timeout(Duration::from_secs(20)).unwrap() {
                ExportEvent::Finished(_) => break,
                ExportEvent::Failed { reason, .. } => panic!("export failed: {}", reason),
                ExportEvent::Started(_) => continue,
            }
        }

        scheduler
            .begin(export_job(dir.path(), "third.png", 100))
            .unwrap();
        loop {
            match events.recv_timeout(Duration::from_secs(10)).unwrap() {
                ExportEvent::Finished(path) => {
                    assert!(path.ends_with("third.png"));
                    break;
                }
                ExportEvent::Failed { reason, .. } => panic!("export failed: {}", reason),
                ExportEvent::Started(_) => continue,
            }
        }
    }

    // Test: Export failure reports the reason and leaves the worker usable
    #[test]
    fn test_export_failure_is_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, events) = ExportScheduler::spawn();

        let mut bad = export_job(dir.path(), "out.png", 100);
        bad.output = PathBuf::from("/nonexistent-dir/out.png");
        scheduler.begin(bad).unwrap();

        loop {
            match events.recv_timeout(Duration::from_secs(10)).unwrap() {
                ExportEvent::Failed { .. } => break,
                ExportEvent::Started(_) => continue,
                ExportEvent::Finished(_) => panic!("write into a missing dir must fail"),
            }
        }

        // Retry with a valid path succeeds
        scheduler
            .begin(export_job(dir.path(), "retry.png", 100))
            .unwrap();
        loop {
            match events.recv_timeout(Duration::from_secs(10)).unwrap() {
                ExportEvent::Finished(_) => break,
                ExportEvent::Failed { reason, .. } => panic!("retry failed: {}", reason),
                ExportEvent::Started(_) => continue,
            }
        }
    }

    // Test: render_snapshot applies tiling over the viewport
    #[test]
    fn test_render_snapshot_tiled() {
        let mut snapshot = text_snapshot(100);
        if let WatermarkStyle::Text(style) = &mut snapshot.style {
            style.tile = TileMode::Square;
            style.tile_gap = 20;
        }

        let mut fonts = FontCache::new();
        let single = render_snapshot(&text_snapshot(100), &mut fonts).unwrap();
        let tiled = render_snapshot(&snapshot, &mut fonts).unwrap();

        assert!(tiled.width() >= snapshot.viewport.0);
        assert!(tiled.height() >= snapshot.viewport.1);
        assert!(tiled.width() > single.width());
    }
}

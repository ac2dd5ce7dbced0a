//! Subcommand implementations.
//!
//! Commands write to any `Write` and read answers from any `BufRead` so the
//! interactive parts can be driven from tests.

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use image::RgbaImage;
use qrlens_core::{
    AcceptOutcome, AppConfig, CropRegion, DecodeLocation, ExplainConfig, HistoryStorage,
    HistoryStore, HostCapabilities, Notice, PermissionState, ResultAction, ScanError,
    ScanOrchestrator, ScanResult, ShareMethod, Size, format_short_timestamp, primary_action,
    truncate_for_display,
};
use qrlens_scan::explain::settle;
use qrlens_scan::pipeline::{ImageScan, commit_choice, load_image, scan_image};
use qrlens_scan::{CropSession, Explainer, GeminiSummarizer, MultiCodeExtractor, RqrrDecoder};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Characters shown per payload in lists.
const LIST_WIDTH: usize = 60;

// ==================== Argument parsing ====================

/// Parse `x,y,w,h` percentages.
pub fn parse_crop(s: &str) -> std::result::Result<CropRegion, String> {
    let values = s
        .split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<f64>()
                .map_err(|e| format!("invalid number '{}': {}", part, e))
        })
        .collect::<std::result::Result<Vec<f64>, String>>()?;

    let [x, y, width, height] = values[..] else {
        return Err(format!("expected x,y,w,h, got {} values", values.len()));
    };
    Ok(CropRegion {
        x,
        y,
        width,
        height,
    })
}

/// Parse `WIDTHxHEIGHT` in pixels.
pub fn parse_viewport(s: &str) -> std::result::Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w: u32 = w
        .trim()
        .parse()
        .map_err(|e| format!("invalid width: {}", e))?;
    let h: u32 = h
        .trim()
        .parse()
        .map_err(|e| format!("invalid height: {}", e))?;
    if w == 0 || h == 0 {
        return Err("viewport sides must be positive".to_string());
    }
    Ok(Size::from((w, h)))
}

// ==================== Presentation ====================

/// Print the notice for `error`, if the user should see one.
pub fn print_notice(out: &mut impl Write, error: &ScanError) -> io::Result<()> {
    if let Some(notice) = Notice::from_error(error) {
        writeln!(
            out,
            "[{}] {}: {}",
            notice.severity.label(),
            notice.title,
            notice.message
        )?;
    }
    Ok(())
}

/// Print an accepted result and its primary action.
pub fn print_result(
    out: &mut impl Write,
    outcome: &AcceptOutcome,
    caps: &HostCapabilities,
) -> io::Result<()> {
    let Some(result) = outcome.result() else {
        return Ok(());
    };
    let status = match outcome {
        AcceptOutcome::Repeated(_) => "already in history",
        _ => "saved",
    };
    writeln!(out, "{} ({})", result.kind.label(), status)?;
    writeln!(out, "  {}", result.content)?;
    match primary_action(result, caps) {
        ResultAction::OpenLink(url) => writeln!(out, "  Open: {}", url)?,
        ResultAction::Share {
            method: ShareMethod::NativeShare,
            ..
        } => writeln!(out, "  Share: available")?,
        ResultAction::Share {
            method: ShareMethod::CopyToClipboard,
            ..
        } => writeln!(out, "  Share: copy the text above")?,
    }
    Ok(())
}

/// Print an overlay polygon in display coordinates.
pub fn print_overlay(out: &mut impl Write, overlay: &DecodeLocation) -> io::Result<()> {
    let points: Vec<String> = overlay
        .corners()
        .iter()
        .map(|p| format!("({:.0},{:.0})", p.x, p.y))
        .collect();
    writeln!(out, "  Overlay: {}", points.join(" "))
}

/// Print history, most recent first.
pub fn print_history<S: HistoryStorage>(
    out: &mut impl Write,
    history: &HistoryStore<S>,
) -> io::Result<()> {
    if history.is_empty() {
        return writeln!(out, "No scans yet.");
    }

    let stats = history.stats();
    writeln!(
        out,
        "{} scans: {} URL, {} Email, {} Phone, {} Text",
        stats.total, stats.urls, stats.emails, stats.phones, stats.texts
    )?;
    for (i, entry) in history.entries().iter().enumerate() {
        writeln!(
            out,
            "{:>3}. {}  {:<5}  {}",
            i + 1,
            format_short_timestamp(entry.timestamp),
            entry.kind.label(),
            truncate_for_display(&entry.content, LIST_WIDTH)
        )?;
    }
    Ok(())
}

// ==================== Prompts ====================

/// Ask a yes/no question; anything but `y`/`yes` is no.
pub fn confirm(prompt: &str, input: &mut impl BufRead, out: &mut impl Write) -> io::Result<bool> {
    write!(out, "{} [y/N] ", prompt)?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Let the user pick one of several codes. Returns a zero-based index.
pub fn choose(
    codes: &[String],
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> io::Result<Option<usize>> {
    writeln!(out, "{} codes found:", codes.len())?;
    for (i, code) in codes.iter().enumerate() {
        writeln!(out, "{:>3}. {}", i + 1, truncate_for_display(code, LIST_WIDTH))?;
    }
    write!(out, "Pick one [1-{}], Enter to cancel: ", codes.len())?;
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=codes.len()).contains(n))
        .map(|n| n - 1))
}

// ==================== Image scanning ====================

/// Options for `scan-image`.
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub path: PathBuf,
    pub crop: Option<CropRegion>,
    /// Positive steps grow the crop, negative steps shrink it.
    pub zoom: i32,
    /// Write the crop preview here.
    pub preview: Option<PathBuf>,
    /// One-based pick when several codes are found.
    pub pick: Option<usize>,
}

impl ImageOptions {
    fn wants_crop(&self) -> bool {
        self.crop.is_some() || self.zoom != 0 || self.preview.is_some()
    }
}

/// Run the crop session non-interactively and return the cropped image.
fn crop_with_session(config: &AppConfig, image: RgbaImage, opts: &ImageOptions) -> Result<RgbaImage> {
    let display = Size::from(image.dimensions());
    let side = config.preview_size;
    let mut session = CropSession::with_min_size(image, display, (side, side), config.min_crop_pct);

    if let Some(region) = opts.crop {
        session.set_region(region);
    }
    for _ in 0..opts.zoom.unsigned_abs() {
        if opts.zoom > 0 {
            session.grow();
        } else {
            session.shrink();
        }
    }
    tracing::debug!("Crop region {:?}", session.region());

    if let Some(path) = &opts.preview {
        session
            .preview()
            .save(path)
            .wrap_err_with(|| format!("Failed to write preview to {}", path.display()))?;
    }
    Ok(session.confirm())
}

/// Scan an image file into history. Returns the presented result, if any.
pub fn scan_image_file<S: HistoryStorage>(
    config: &AppConfig,
    orchestrator: &mut ScanOrchestrator<S>,
    caps: &HostCapabilities,
    opts: &ImageOptions,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<Option<ScanResult>> {
    let mut image = match load_image(&opts.path) {
        Ok(image) => image,
        Err(e) => {
            print_notice(out, &e)?;
            return Ok(None);
        }
    };
    if opts.wants_crop() {
        image = crop_with_session(config, image, opts)?;
    }

    let extractor = MultiCodeExtractor::with_budget(RqrrDecoder, config.attempt_budget);
    let outcome = match scan_image(&extractor, &image, orchestrator) {
        Ok(ImageScan::Accepted(outcome)) => outcome,
        Ok(ImageScan::Choice(codes)) => {
            let index = match opts.pick {
                Some(n) => n.checked_sub(1),
                None => choose(&codes, input, out)?,
            };
            match index.and_then(|i| commit_choice(orchestrator, &codes, i)) {
                Some(outcome) => outcome,
                None => {
                    writeln!(out, "No code selected.")?;
                    return Ok(None);
                }
            }
        }
        Err(e) => {
            print_notice(out, &e)?;
            return Ok(None);
        }
    };

    print_result(out, &outcome, caps)?;
    Ok(outcome.result().cloned())
}

// ==================== History ====================

/// Clear history after confirmation, unless `assume_yes`.
pub fn clear_history<S: HistoryStorage>(
    orchestrator: &mut ScanOrchestrator<S>,
    assume_yes: bool,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> io::Result<bool> {
    let count = orchestrator.history().len();
    if count == 0 {
        writeln!(out, "History is already empty.")?;
        return Ok(false);
    }
    let prompt = format!("Delete all {} scans?", count);
    if !assume_yes && !confirm(&prompt, input, out)? {
        writeln!(out, "Kept history.")?;
        return Ok(false);
    }
    orchestrator.clear_history();
    writeln!(out, "Cleared {} scans.", count)?;
    Ok(true)
}

// ==================== Explanation ====================

/// Explain `content`, degrading to the fixed fallback text on any failure.
pub async fn explain_content(config: &ExplainConfig, content: &str) -> String {
    match GeminiSummarizer::from_env(
        &config.api_key_vars,
        config.model.clone(),
        config.temperature,
    ) {
        Ok(summarizer) => Explainer::new(summarizer).explain(content).await.to_string(),
        Err(e) => settle(Err(e)),
    }
}

// ==================== Status ====================

/// Print permission, mode and capability information.
pub fn print_status(
    out: &mut impl Write,
    permission: PermissionState,
    caps: &HostCapabilities,
    history_path: Option<&std::path::Path>,
) -> io::Result<()> {
    let (bundle, terminal) = qrlens_scan::permission::app_bundle_id();
    writeln!(out, "Camera permission: {:?}", permission)?;
    writeln!(
        out,
        "Scan mode: {:?}",
        qrlens_core::ScanMode::for_permission(permission)
    )?;
    writeln!(out, "Camera support: {}", cfg!(feature = "camera"))?;
    writeln!(out, "Permission query: {}", caps.permission_query)?;
    writeln!(out, "Share method: {:?}", caps.share_method())?;
    writeln!(out, "Terminal: {} ({})", terminal, bundle)?;
    if let Some(path) = history_path {
        writeln!(out, "History: {}", path.display())?;
    }
    Ok(())
}

// ==================== Camera ====================

/// Options for `camera`.
#[derive(Debug, Clone, Default)]
pub struct CameraOptions {
    pub facing: Option<qrlens_core::Facing>,
    /// Stop after this many accepted results.
    pub count: usize,
    pub torch: bool,
    /// Preview size for overlay coordinates.
    pub viewport: Option<Size>,
}

/// Live camera scanning until `count` results or Ctrl-C.
#[cfg(feature = "camera")]
pub async fn scan_camera<S: HistoryStorage>(
    config: &AppConfig,
    orchestrator: &mut ScanOrchestrator<S>,
    caps: &HostCapabilities,
    opts: &CameraOptions,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<Vec<ScanResult>> {
    use qrlens_core::ScanMode;
    use qrlens_scan::pipeline::acquire_camera;
    use qrlens_scan::{CameraSource, IntervalClock, LiveScanner, NokhwaBackend, ScanLoop};
    use tokio_util::sync::CancellationToken;

    let permission = qrlens_scan::permission::camera_permission();
    let facing = opts.facing.unwrap_or(config.camera.facing);
    let mut camera = CameraSource::new(
        NokhwaBackend::new(),
        (config.camera.width, config.camera.height),
    );

    loop {
        match acquire_camera(&mut camera, facing, permission) {
            Ok(ScanMode::LiveCamera) => break,
            Ok(ScanMode::GalleryOnly) => {
                print_notice(
                    out,
                    &ScanError::PermissionDenied("camera access is blocked".to_string()),
                )?;
                writeln!(out, "Use `qrlens scan-image <path>` instead.")?;
                return Ok(Vec::new());
            }
            Err(e) => {
                print_notice(out, &e)?;
                if !(e.is_retriable() && confirm("Retry?", input, out)?) {
                    return Ok(Vec::new());
                }
            }
        }
    }
    let caps = &camera.host_capabilities(*caps);
    if opts.torch {
        if caps.torch {
            camera.set_torch(true);
        }
        if !camera.state().torch_on {
            writeln!(out, "Flashlight is not available on this camera.")?;
        }
    }

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    writeln!(out, "Scanning, press Ctrl-C to stop.")?;
    let mut scanner = LiveScanner::new(ScanLoop::new(
        RqrrDecoder,
        IntervalClock::new(config.frame_interval()),
    ));
    let mut results = Vec::new();
    while results.len() < opts.count.max(1) {
        let Some(hit) = scanner
            .next_result(&mut camera, orchestrator, &cancel)
            .await
        else {
            break;
        };
        print_result(out, &hit.outcome, caps)?;
        if let Some(viewport) = opts.viewport {
            print_overlay(out, &hit.overlay(viewport))?;
        }
        if let Some(result) = hit.outcome.result() {
            results.push(result.clone());
        }
    }

    camera.stop();
    Ok(results)
}

/// Without a capture backend only image scanning is possible.
#[cfg(not(feature = "camera"))]
pub async fn scan_camera<S: HistoryStorage>(
    _config: &AppConfig,
    _orchestrator: &mut ScanOrchestrator<S>,
    _caps: &HostCapabilities,
    _opts: &CameraOptions,
    _input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<Vec<ScanResult>> {
    print_notice(
        out,
        &ScanError::DeviceUnavailable("built without camera support".to_string()),
    )?;
    writeln!(out, "Use `qrlens scan-image <path>` instead.")?;
    Ok(Vec::new())
}

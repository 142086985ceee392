use std::time::Duration;

use anyhow::{Result, ensure};
use chrono::{DateTime, Utc};
use config_model::SplashScreenConfig;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::board::{Board, FetchTrigger, Frame, ROW_HEIGHT, ROWS};
use crate::events::PowerMode;
use crate::render::{Element, ElementId, ElementKind, PanelControl, Surface, remove_quietly};
use crate::service::DisplayTimeFormatter;

use super::blink::BlinkState;

const MIN_PAUSE: Duration = Duration::from_millis(1);

/// Sleeps out the rest of each frame budget and tracks overruns.
#[derive(Debug)]
pub struct FramePacer {
    budget: Duration,
    warn_every: u64,
    overruns: u64,
}

impl FramePacer {
    pub fn new(target_fps: u32) -> Self {
        let fps = target_fps.max(1);
        Self {
            budget: Duration::from_secs(1) / fps,
            warn_every: u64::from(fps) * 60,
            overruns: 0,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Consecutive frames that took longer than the budget.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Pause before the next frame, given how long this one took.
    pub fn pause_after(&mut self, elapsed: Duration) -> Duration {
        if elapsed < self.budget {
            self.overruns = 0;
            return (self.budget - elapsed).max(MIN_PAUSE);
        }
        self.overruns += 1;
        if self.overruns == 1 || self.overruns % self.warn_every == 0 {
            warn!(
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.budget.as_secs_f64() * 1000.0,
                overruns = self.overruns,
                "frame overran its budget"
            );
        }
        MIN_PAUSE
    }
}

/// Wall clock in the strip below the rows.
#[derive(Debug)]
struct ClockFace {
    formatter: DisplayTimeFormatter,
    element: Option<ElementId>,
    text: String,
}

impl ClockFace {
    fn new(formatter: DisplayTimeFormatter) -> Self {
        Self {
            formatter,
            element: None,
            text: String::new(),
        }
    }

    fn update<S: Surface + ?Sized>(&mut self, surface: &mut S, now: DateTime<Utc>) {
        let top = ROW_HEIGHT * ROWS as u32;
        if surface.height() < top + ROW_HEIGHT {
            return;
        }
        let text = self.formatter.clock(now).to_string().trim().to_string();
        if self.element.is_some() && text == self.text {
            return;
        }

        if let Some(id) = self.element {
            match surface.replace(id, ElementKind::Clock(text.clone())) {
                Ok(()) => {
                    self.text = text;
                    return;
                }
                Err(err) => trace!(error = %err, "clock element vanished"),
            }
        }
        let width = surface.text_width(&text);
        let x = (surface.width().saturating_sub(width) / 2) as i32;
        self.element = Some(surface.add(Element::new(
            ElementKind::Clock(text.clone()),
            x,
            top as i32,
            width,
            ROW_HEIGHT,
        )));
        self.text = text;
    }

    fn clear<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        remove_quietly(surface, self.element.take());
        self.text.clear();
    }
}

#[derive(Debug, Clone)]
pub struct FrameLoopOptions {
    pub target_fps: u32,
    pub splash: SplashScreenConfig,
    /// Contrast used while the energy saver dims the panel.
    pub dim_contrast: u8,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Formats the clock shown below the rows.
    pub clock: DisplayTimeFormatter,
}

impl Default for FrameLoopOptions {
    fn default() -> Self {
        Self {
            target_fps: 30,
            splash: SplashScreenConfig::default(),
            dim_contrast: 15,
            max_frames: None,
            clock: DisplayTimeFormatter::default(),
        }
    }
}

/// Show the splash for its configured duration. Returns `false` if cancelled meanwhile.
async fn show_splash<S: Surface + ?Sized>(
    surface: &mut S,
    splash: &SplashScreenConfig,
    cancel: &CancellationToken,
) -> bool {
    let duration = splash.effective_duration();
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    let width = surface.width();
    let height = surface.height();
    let id = surface.add(Element::new(
        ElementKind::Splash {
            title: splash.title_or_default().into_owned(),
            subtitle: splash.subtitle_or_default().into_owned(),
        },
        0,
        0,
        width,
        height,
    ));
    debug!(duration = %humantime::format_duration(duration), "showing splash screen");
    let completed = tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    };
    remove_quietly(surface, Some(id));
    completed
}

/// Apply a power transition. Returns `true` when the panel is waking from off.
fn apply_power<S, T>(
    board: &mut Board<S, T>,
    clock: &mut ClockFace,
    from: PowerMode,
    to: PowerMode,
    dim_contrast: u8,
) -> bool
where
    S: Surface + PanelControl,
    T: FetchTrigger,
{
    if from == to {
        return false;
    }
    info!(from = ?from, to = ?to, "power mode changed");
    let waking = from == PowerMode::Off;
    match to {
        PowerMode::Off => {
            board.suspend();
            clock.clear(board.surface_mut());
            board.surface_mut().hide();
        }
        PowerMode::Dim => {
            if waking {
                board.surface_mut().show();
            }
            board.surface_mut().set_contrast(dim_contrast);
        }
        PowerMode::Normal => {
            if waking {
                board.surface_mut().show();
            }
            board.surface_mut().set_contrast(u8::MAX);
        }
    }
    waking
}

/// Drive the board at the target frame rate until cancelled.
pub async fn run<S, T>(
    board: &mut Board<S, T>,
    blink: BlinkState,
    mut power: mpsc::Receiver<PowerMode>,
    options: FrameLoopOptions,
    cancel: CancellationToken,
) -> Result<()>
where
    S: Surface + PanelControl,
    T: FetchTrigger,
{
    ensure!(options.target_fps > 0, "target-fps must be positive");
    let mut pacer = FramePacer::new(options.target_fps);
    let mut clock = ClockFace::new(options.clock.clone());
    let mut mode = PowerMode::Normal;
    let mut frames: u64 = 0;

    if !show_splash(board.surface_mut(), &options.splash, &cancel).await {
        return Ok(());
    }

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if mode == PowerMode::Off {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = power.recv() => next.unwrap_or(PowerMode::Normal),
            };
            let waking = apply_power(board, &mut clock, mode, next, options.dim_contrast);
            mode = next;
            if waking {
                if !show_splash(board.surface_mut(), &options.splash, &cancel).await {
                    break;
                }
                board.resume();
            }
            continue;
        }

        let mut woke = false;
        while let Ok(next) = power.try_recv() {
            woke |= apply_power(board, &mut clock, mode, next, options.dim_contrast);
            mode = next;
        }
        if mode == PowerMode::Off {
            continue;
        }
        if woke {
            if !show_splash(board.surface_mut(), &options.splash, &cancel).await {
                break;
            }
            board.resume();
        }

        let started = Instant::now();
        let frame = Frame {
            now: Utc::now(),
            blink_visible: blink.is_visible(),
        };
        board.tick(&frame);
        clock.update(board.surface_mut(), frame.now);

        frames += 1;
        if options.max_frames.is_some_and(|max| frames >= max) {
            info!(frames, "frame limit reached");
            break;
        }

        let pause = pacer.pause_after(started.elapsed());
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(pause) => {}
        }
    }

    clock.clear(board.surface_mut());
    debug!(frames, "frame loop stopped");
    Ok(())
}

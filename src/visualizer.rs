//! Audio-reactive orb: frame geometry plus the start/stop/fade loop state.
//!
//! The loop is driven from outside: the host calls [`Visualizer::tick`] once
//! per frame while [`Visualizer::is_animating`] is true, so stopping can never
//! leave an orphaned frame callback behind.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

use crate::state_machine::LevelSmoother;

/// Analyser bin count (FFT size 2048).
pub const FREQUENCY_BINS: usize = 1024;
pub const BAR_COUNT: usize = 180;
const FADE_STEP: f32 = 0.05;

/// Live microphone spectrum.
pub trait FrequencySource: Send {
    fn fill(&mut self, bins: &mut [u8]);
}

/// Speech-output stand-in: noise plus a travelling sine, clamped to a byte.
pub struct SyntheticEnvelope {
    rng: StdRng,
}

impl SyntheticEnvelope {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn fill(&mut self, bins: &mut [u8], now_ms: f64) {
        for (i, bin) in bins.iter_mut().enumerate() {
            let noise: f64 = self.rng.gen_range(0.0..180.0);
            let wave = (i as f64 + now_ms / 100.0).sin() * 50.0;
            *bin = (noise + wave).clamp(0.0, 255.0) as u8;
        }
    }
}

impl Default for SyntheticEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub angle: f32,
    pub height: f32,
}

/// Idle orb: a faint ring and a glowing dot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticOrb {
    pub center: (f32, f32),
    pub ring_radius: f32,
    pub dot_radius: f32,
    pub color: [f32; 3],
}

impl StaticOrb {
    pub fn new(width: f32, height: f32, color: [f32; 3]) -> Self {
        let radius = width * 0.25;
        Self {
            center: (width / 2.0, height / 2.0),
            ring_radius: radius * 0.9,
            dot_radius: radius * 0.2,
            color,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrbFrame {
    pub pulse_radius: f32,
    pub bars: Vec<Bar>,
    pub core_radius: f32,
    pub level: f32,
    pub orb: StaticOrb,
}

impl OrbFrame {
    pub fn from_bins(width: f32, height: f32, bins: &[u8], level: f32, color: [f32; 3]) -> Self {
        let radius = width * 0.25;
        let mean = if bins.is_empty() {
            0.0
        } else {
            bins.iter().map(|&b| b as f32).sum::<f32>() / bins.len() as f32
        };
        let sample = |idx: usize| bins.get(idx).copied().unwrap_or(0) as f32;

        let bars = (0..BAR_COUNT)
            .map(|i| {
                let idx = (i as f32 * (bins.len() as f32 / BAR_COUNT as f32)).floor() as usize;
                Bar {
                    angle: i as f32 / BAR_COUNT as f32 * TAU,
                    height: sample(idx) / 256.0 * 100.0,
                }
            })
            .collect();

        Self {
            pulse_radius: radius * 1.5 + (mean / 256.0) * 30.0,
            bars,
            core_radius: radius * 0.8 + (sample(10) / 256.0) * 15.0,
            level,
            orb: StaticOrb::new(width, height, color),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Orb(OrbFrame),
    Fade { alpha: f32, orb: StaticOrb },
    Static(StaticOrb),
}

/// Drawing surface for frames.
pub trait Canvas: Send {
    fn size(&self) -> (f32, f32);
    fn draw(&mut self, frame: &Frame);
}

/// Reports frames to the log at trace level.
pub struct LogCanvas {
    width: f32,
    height: f32,
}

impl LogCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Canvas for LogCanvas {
    fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn draw(&mut self, frame: &Frame) {
        match frame {
            Frame::Orb(orb) => log::trace!(
                "[Visualizer] pulse={:.1} core={:.1} level={:.2}",
                orb.pulse_radius,
                orb.core_radius,
                orb.level
            ),
            Frame::Fade { alpha, .. } => log::trace!("[Visualizer] fade alpha={:.2}", alpha),
            Frame::Static(_) => log::trace!("[Visualizer] static orb"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VisualizerMode {
    Idle,
    Live,
    Simulated,
    FadingOut { alpha: f32 },
}

pub struct Visualizer {
    mode: VisualizerMode,
    live: Option<Box<dyn FrequencySource>>,
    synthetic: SyntheticEnvelope,
    bins: Vec<u8>,
    smoother: LevelSmoother,
    color: [f32; 3],
}

impl Visualizer {
    pub fn new(live: Option<Box<dyn FrequencySource>>) -> Self {
        Self::with_envelope(live, SyntheticEnvelope::new())
    }

    pub fn with_envelope(live: Option<Box<dyn FrequencySource>>, synthetic: SyntheticEnvelope) -> Self {
        Self {
            mode: VisualizerMode::Idle,
            live,
            synthetic,
            bins: vec![0; FREQUENCY_BINS],
            smoother: LevelSmoother::new(),
            color: crate::state_machine::SessionState::Idle.glow_color(),
        }
    }

    pub fn mode(&self) -> VisualizerMode {
        self.mode
    }

    pub fn is_animating(&self) -> bool {
        self.mode != VisualizerMode::Idle
    }

    pub fn set_color(&mut self, color: [f32; 3]) {
        self.color = color;
    }

    /// Animate from the microphone. Without a live source there is nothing to
    /// draw and the orb stays idle.
    pub fn start_live(&mut self) -> bool {
        if self.live.is_none() {
            log::debug!("[Visualizer] No live source, staying idle");
            return false;
        }
        self.mode = VisualizerMode::Live;
        true
    }

    /// Animate from the synthetic speech envelope.
    pub fn start_simulated(&mut self) {
        self.mode = VisualizerMode::Simulated;
    }

    /// Begin the fade-out. No-op unless a loop is running.
    pub fn stop(&mut self) -> bool {
        match self.mode {
            VisualizerMode::Live | VisualizerMode::Simulated => {
                self.mode = VisualizerMode::FadingOut { alpha: 1.0 };
                true
            }
            VisualizerMode::FadingOut { .. } | VisualizerMode::Idle => false,
        }
    }

    /// Stop only the microphone-driven loop; a speech loop keeps running.
    pub fn stop_live(&mut self) -> bool {
        self.mode == VisualizerMode::Live && self.stop()
    }

    /// Produce the next frame, or `None` when idle.
    pub fn tick(&mut self, width: f32, height: f32, now_ms: f64) -> Option<Frame> {
        match self.mode {
            VisualizerMode::Idle => None,
            VisualizerMode::Live => {
                if let Some(live) = self.live.as_mut() {
                    live.fill(&mut self.bins);
                }
                Some(self.orb_frame(width, height))
            }
            VisualizerMode::Simulated => {
                self.synthetic.fill(&mut self.bins, now_ms);
                Some(self.orb_frame(width, height))
            }
            VisualizerMode::FadingOut { alpha } => {
                let orb = StaticOrb::new(width, height, self.color);
                let next = alpha - FADE_STEP;
                if next > 1e-3 {
                    self.mode = VisualizerMode::FadingOut { alpha: next };
                    Some(Frame::Fade { alpha, orb })
                } else {
                    self.mode = VisualizerMode::Idle;
                    self.bins.fill(0);
                    Some(Frame::Static(orb))
                }
            }
        }
    }

    fn orb_frame(&mut self, width: f32, height: f32) -> Frame {
        let mean = self.bins.iter().map(|&b| b as f32).sum::<f32>() / self.bins.len().max(1) as f32;
        let level = self.smoother.update(mean / 255.0, true, self.color);
        Frame::Orb(OrbFrame::from_bins(width, height, &self.bins, level, self.smoother.color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(u8);

    impl FrequencySource for Constant {
        fn fill(&mut self, bins: &mut [u8]) {
            bins.fill(self.0);
        }
    }

    fn live(value: u8) -> Visualizer {
        Visualizer::with_envelope(Some(Box::new(Constant(value))), SyntheticEnvelope::seeded(7))
    }

    #[test]
    fn geometry_follows_canvas_and_levels() {
        let bins = vec![128u8; FREQUENCY_BINS];
        let frame = OrbFrame::from_bins(400.0, 400.0, &bins, 0.5, [1.0; 3]);
        assert_eq!(frame.bars.len(), BAR_COUNT);
        assert!((frame.pulse_radius - (150.0 + 15.0)).abs() < 1e-3);
        assert!((frame.core_radius - (80.0 + 7.5)).abs() < 1e-3);
        assert!((frame.bars[0].height - 50.0).abs() < 1e-3);
        assert!((frame.bars[90].angle - std::f32::consts::PI).abs() < 1e-4);
        assert_eq!(frame.orb.center, (200.0, 200.0));
        assert!((frame.orb.ring_radius - 90.0).abs() < 1e-3);
    }

    #[test]
    fn synthetic_envelope_stays_in_byte_range() {
        let mut envelope = SyntheticEnvelope::seeded(1);
        let mut bins = vec![0u8; 64];
        envelope.fill(&mut bins, 12_345.0);
        assert!(bins.iter().any(|&b| b > 0));
    }

    #[test]
    fn stop_fades_out_then_goes_idle() {
        let mut vis = live(200);
        assert!(vis.start_live());
        assert!(matches!(vis.tick(300.0, 300.0, 0.0), Some(Frame::Orb(_))));

        assert!(vis.stop());
        let mut fades = 0;
        while let Some(frame) = vis.tick(300.0, 300.0, 0.0) {
            match frame {
                Frame::Fade { .. } => fades += 1,
                Frame::Static(_) => break,
                Frame::Orb(_) => panic!("orb frame during fade"),
            }
        }
        assert_eq!(fades, 19);
        assert_eq!(vis.mode(), VisualizerMode::Idle);
        assert_eq!(vis.tick(300.0, 300.0, 0.0), None);
    }

    #[test]
    fn stop_when_idle_is_a_no_op() {
        let mut vis = live(10);
        assert!(!vis.stop());
        assert!(!vis.stop());
        assert!(!vis.is_animating());
        assert_eq!(vis.tick(100.0, 100.0, 0.0), None);
    }

    #[test]
    fn repeated_stop_does_not_restart_fade() {
        let mut vis = live(10);
        vis.start_simulated();
        assert!(vis.stop());
        vis.tick(100.0, 100.0, 0.0);
        assert!(!vis.stop());
        match vis.mode() {
            VisualizerMode::FadingOut { alpha } => assert!((alpha - 0.95).abs() < 1e-4),
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn live_stop_spares_speech_loop() {
        let mut vis = live(10);
        vis.start_simulated();
        assert!(!vis.stop_live());
        assert_eq!(vis.mode(), VisualizerMode::Simulated);
    }

    #[test]
    fn no_live_source_stays_idle() {
        let mut vis = Visualizer::new(None);
        assert!(!vis.start_live());
        assert!(!vis.is_animating());
    }
}

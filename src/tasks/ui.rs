// WheelSense — UI Task
//
// Owns the panel and the mode button.  Polls the button, runs the display
// mode timer, redraws when the shown value changes, and forwards long
// presses to the reset monitor.

use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use embedded_hal::digital::InputPin;

use crate::config::*;
use crate::context::Context;
use crate::display::{Dashboard, ModeCycler};
use crate::drivers::framebuffer::{Framebuffer, Panel};
use crate::events::{ButtonEvent, ResetRequest};
use crate::input::Button;
use crate::retained::RetainedMemory;
use crate::store::KvBackend;

pub struct Ui<D: Panel> {
    panel: D,
    frame: Framebuffer,
    dashboard: Dashboard,
    cycler: ModeCycler,
}

impl<D: Panel> Ui<D> {
    pub fn new(panel: D, now_ms: u64) -> Self {
        Self {
            panel,
            frame: Framebuffer::new(),
            dashboard: Dashboard::new(),
            cycler: ModeCycler::new(now_ms),
        }
    }

    pub fn panel(&self) -> &D {
        &self.panel
    }

    /// Apply a button event and the mode timer.  Long presses go out tagged
    /// with the mode on screen.  Never holds the mode lock and the motion lock
    /// together.
    pub fn handle<B, M>(&mut self, ctx: &Context<B, M>, event: Option<ButtonEvent>, now_ms: u64, reset_tx: &Sender<ResetRequest>)
    where
        B: KvBackend,
        M: RetainedMemory,
    {
        let changed = match event {
            Some(ButtonEvent::ShortPress) => Some(self.cycler.press(now_ms)),
            Some(ButtonEvent::LongPress) => {
                // The mode timer may switch screens on this same poll.
                let mode = self.cycler.mode();
                log::info!("Long press in {:?}", mode);
                if reset_tx.send(ResetRequest { mode }).is_err() {
                    log::warn!("Reset monitor is gone; long press dropped");
                }
                None
            }
            None => None,
        };
        let changed = changed.or_else(|| self.cycler.tick(now_ms));

        if let Some(mode) = changed {
            if !ctx.display_mode.set(mode, Duration::from_millis(LOCK_TIMEOUT_MS)) {
                log::warn!("Display mode busy; {:?} not published", mode);
            }
        }
    }

    /// Redraw if the visible value changed.  Returns whether a frame was sent.
    pub fn refresh<B, M>(&mut self, ctx: &Context<B, M>) -> bool
    where
        B: KvBackend,
        M: RetainedMemory,
    {
        let mode = self.cycler.mode();
        let Some(snapshot) = ctx.motion.snapshot(Duration::from_millis(LOCK_TIMEOUT_FAST_MS)) else {
            return false;
        };
        if !self.dashboard.needs_redraw(mode, &snapshot) {
            return false;
        }
        // Drawing into the framebuffer cannot fail.
        let _ = self.dashboard.render(&mut self.frame, mode, &snapshot);
        match self.panel.flush(&self.frame) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Display error: {:#}", e);
                false
            }
        }
    }
}

pub fn ui_task<B, M, P, D>(ctx: Context<B, M>, mut button: Button<P>, panel: D, reset_tx: Sender<ResetRequest>)
where
    B: KvBackend,
    M: RetainedMemory,
    P: InputPin,
    D: Panel,
{
    log::info!("UI task started");

    let mut ui = Ui::new(panel, crate::now_ms());
    let poll_interval = Duration::from_millis(UI_POLL_INTERVAL_MS);

    loop {
        let now = crate::now_ms();
        let event = button.poll(now);
        ui.handle(&ctx, event, now, &reset_tx);
        ui.refresh(&ctx);
        thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    use crate::config::Settings;
    use crate::events::DisplayMode;
    use crate::retained::{MemoryRetained, RetainedState};
    use crate::store::{CounterStore, MemoryBackend};

    #[derive(Default)]
    struct CountingPanel {
        frames: u32,
    }

    impl Panel for CountingPanel {
        fn flush(&mut self, _frame: &Framebuffer) -> anyhow::Result<()> {
            self.frames += 1;
            Ok(())
        }
    }

    fn context() -> Context<MemoryBackend, MemoryRetained> {
        Context::new(
            Settings::default(),
            CounterStore::open(MemoryBackend::new()),
            RetainedState::restore(MemoryRetained::new()),
        )
    }

    #[test]
    fn short_press_publishes_next_mode() {
        let ctx = context();
        let (tx, _rx) = mpsc::channel();
        let mut ui = Ui::new(CountingPanel::default(), 0);

        ui.handle(&ctx, Some(ButtonEvent::ShortPress), 100, &tx);
        assert_eq!(ctx.display_mode.get(Duration::from_millis(10)), Some(DisplayMode::DailyDistance));

        // The automatic switch due at 3000 ms is swallowed.
        ui.handle(&ctx, None, 3100, &tx);
        assert_eq!(ctx.display_mode.get(Duration::from_millis(10)), Some(DisplayMode::DailyDistance));
    }

    #[test]
    fn long_press_is_forwarded() {
        let ctx = context();
        let (tx, rx) = mpsc::channel();
        let mut ui = Ui::new(CountingPanel::default(), 0);

        ui.handle(&ctx, Some(ButtonEvent::LongPress), 1000, &tx);
        assert_eq!(rx.try_recv(), Ok(ResetRequest { mode: DisplayMode::Speed }));
        assert_eq!(ctx.display_mode.get(Duration::from_millis(10)), Some(DisplayMode::Speed));
    }

    #[test]
    fn long_press_on_the_auto_switch_poll_resets_the_shown_mode() {
        use crate::reset::reset_shown;

        let ctx = context();
        ctx.motion.lock(Duration::from_millis(10)).unwrap().max_speed_kmh = 42.0;
        let (tx, rx) = mpsc::channel();
        let mut ui = Ui::new(CountingPanel::default(), 0);

        // Speed -> DailyDistance -> TotalDistance on the timer.
        ui.handle(&ctx, None, 3000, &tx);
        ui.handle(&ctx, None, 6000, &tx);
        assert_eq!(ctx.display_mode.get(Duration::from_millis(10)), Some(DisplayMode::TotalDistance));

        // The press and the switch to MaxSpeed land on the same poll.
        ui.handle(&ctx, Some(ButtonEvent::LongPress), 9000, &tx);
        assert_eq!(ctx.display_mode.get(Duration::from_millis(10)), Some(DisplayMode::MaxSpeed));

        let request = rx.try_recv().unwrap();
        assert_eq!(request.mode, DisplayMode::TotalDistance);
        assert_eq!(reset_shown(&ctx, request.mode), None);
        assert_eq!(ctx.motion.snapshot(Duration::from_millis(10)).unwrap().max_speed_kmh, 42.0);
    }

    #[test]
    fn refresh_only_redraws_on_change() {
        let ctx = context();
        let mut ui = Ui::new(CountingPanel::default(), 0);

        assert!(ui.refresh(&ctx));
        assert!(!ui.refresh(&ctx));
        ctx.motion.lock(Duration::from_millis(10)).unwrap().set_speed(21.0);
        assert!(ui.refresh(&ctx));
        assert_eq!(ui.panel().frames, 2);
    }
}

use crate::video::debug_log;

/// Host-side cold/warm start reporting. Fire-and-forget; the core never
/// waits on it.
pub trait AppStateReporter: Send {
    fn report_fully_drawn(&self);
}

/// Host-side splash screen control. The splash must be held at startup and
/// hidden only after the first content paint has been reported.
pub trait SplashScreen: Send {
    fn prevent_auto_hide(&self);
    fn hide(&self);
}

/// Optional host integrations, injected by the composition root so the core
/// stays testable without a host.
#[derive(Default)]
pub struct Hooks {
    pub app_state: Option<Box<dyn AppStateReporter>>,
    pub splash: Option<Box<dyn SplashScreen>>,
}

impl Hooks {
    pub fn report_fully_drawn(&self) {
        if let Some(reporter) = &self.app_state {
            reporter.report_fully_drawn();
        }
    }

    pub fn prevent_splash_auto_hide(&self) {
        if let Some(splash) = &self.splash {
            splash.prevent_auto_hide();
        }
    }

    pub fn hide_splash(&self) {
        if let Some(splash) = &self.splash {
            splash.hide();
        }
    }
}

/// Debug-log host hooks used by the standalone binary, where no real host
/// process is listening.
pub struct LogReporter;

impl AppStateReporter for LogReporter {
    fn report_fully_drawn(&self) {
        debug_log("host: report fully drawn");
    }
}

pub struct LogSplashScreen;

impl SplashScreen for LogSplashScreen {
    fn prevent_auto_hide(&self) {
        debug_log("host: splash auto-hide prevented");
    }

    fn hide(&self) {
        debug_log("host: splash hidden");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub(crate) struct CountingReporter(pub Arc<AtomicUsize>);

    impl AppStateReporter for CountingReporter {
        fn report_fully_drawn(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn empty_hooks_are_noops() {
        let hooks = Hooks::default();
        hooks.prevent_splash_auto_hide();
        hooks.report_fully_drawn();
        hooks.hide_splash();
    }

    #[test]
    fn reporter_hook_is_invoked() {
        let count = Arc::new(AtomicUsize::new(0));
        let hooks = Hooks {
            app_state: Some(Box::new(CountingReporter(count.clone()))),
            splash: None,
        };
        hooks.report_fully_drawn();
        hooks.report_fully_drawn();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

use crate::error::{PassError, Result};
use crate::traits::backend::ComputeBackend;
use crate::traits::custom_pass::{CustomPass, FrameContext};

use super::viewport::Viewport;

/// Lifecycle of a pass volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeState {
    /// No pass has been set up yet
    Uninitialized,
    /// Setup ran; frames may be rendered
    Ready,
    /// A pass failed setup; every later frame fails without retrying
    Failed,
    /// Cleanup ran; no further frames
    TornDown,
}

struct PassEntry<B: ComputeBackend> {
    pass: Box<dyn CustomPass<B>>,
    enabled: bool,
}

/// Host for custom passes.
///
/// Owns the passes and calls their hooks in order: `setup` once before the
/// first frame, `execute` for every enabled pass each frame, `cleanup` once
/// at teardown.
pub struct PassVolume<B: ComputeBackend> {
    passes: Vec<PassEntry<B>>,
    state: VolumeState,
    /// Pass name and reason of the setup failure, once failed
    failure: Option<(String, String)>,
    frames: u64,
}

impl<B: ComputeBackend> PassVolume<B> {
    /// Create empty volume
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            state: VolumeState::Uninitialized,
            failure: None,
            frames: 0,
        }
    }

    /// Add pass and return the volume
    pub fn with_pass(mut self, pass: Box<dyn CustomPass<B>>) -> Self {
        self.push(pass);
        self
    }

    /// Add pass; returns its index
    pub fn push(&mut self, pass: Box<dyn CustomPass<B>>) -> usize {
        self.passes.push(PassEntry { pass, enabled: true });
        self.passes.len() - 1
    }

    /// Host-level enable flag. Disabled passes are not executed.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> bool {
        match self.passes.get_mut(index) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, index: usize) -> Option<bool> {
        self.passes.get(index).map(|e| e.enabled)
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn state(&self) -> VolumeState {
        self.state
    }

    /// Frames rendered since setup
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run setup on every pass. Happens automatically on the first frame.
    ///
    /// Setup is attempted once. If a pass fails, the passes already set up
    /// are cleaned up and the volume stays failed.
    pub fn setup(&mut self, backend: &mut B) -> Result<()> {
        match self.state {
            VolumeState::Ready => return Ok(()),
            VolumeState::TornDown => return Err(PassError::TornDown),
            VolumeState::Failed => {
                let (pass, reason) = self.failure.clone().unwrap_or_default();
                return Err(PassError::SetupFailed { pass, reason });
            }
            VolumeState::Uninitialized => {}
        }

        for index in 0..self.passes.len() {
            let pass = &mut self.passes[index].pass;
            log::debug!("setting up {}", pass.name());
            if let Err(err) = pass.setup(backend) {
                log::error!("setup of {} failed: {}", pass.name(), err);
                self.failure = Some((pass.name().to_string(), err.to_string()));
                for entry in &mut self.passes[..index] {
                    entry.pass.cleanup(backend);
                }
                self.state = VolumeState::Failed;
                return Err(err);
            }
        }
        self.state = VolumeState::Ready;
        Ok(())
    }

    /// Execute every enabled pass for one frame, then submit
    pub fn render_frame(
        &mut self,
        backend: &mut B,
        camera: Viewport,
        color_buffer: &mut B::ColorTarget,
    ) -> Result<()> {
        self.setup(backend)?;

        let mut ctx = FrameContext::new(camera, color_buffer, backend);
        let executed = self
            .passes
            .iter_mut()
            .filter(|e| e.enabled)
            .try_for_each(|entry| entry.pass.execute(&mut ctx));
        if let Err(err) = executed {
            ctx.cmd.discard();
            return Err(err);
        }
        ctx.cmd.submit()?;

        self.frames += 1;
        Ok(())
    }

    /// Run cleanup on every pass. Safe to call more than once.
    pub fn teardown(&mut self, backend: &mut B) {
        match self.state {
            VolumeState::TornDown => return,
            // Passes were already cleaned up when setup failed
            VolumeState::Failed => {}
            VolumeState::Uninitialized | VolumeState::Ready => {
                for entry in &mut self.passes {
                    entry.pass.cleanup(backend);
                }
            }
        }
        self.state = VolumeState::TornDown;
        log::debug!("pass volume torn down after {} frames", self.frames);
    }
}

impl<B: ComputeBackend> Default for PassVolume<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cpu_backend::{CpuBackend, Image};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every hook call into a shared log
    struct Probe {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        fail_setup: bool,
        fail_execute: bool,
    }

    impl Probe {
        fn boxed(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Box<Self> {
            Box::new(Self {
                name,
                log: log.clone(),
                fail_setup: false,
                fail_execute: false,
            })
        }
    }

    impl CustomPass<CpuBackend> for Probe {
        fn setup(&mut self, _backend: &mut CpuBackend) -> Result<()> {
            self.log.borrow_mut().push(format!("{}:setup", self.name));
            if self.fail_setup {
                return Err(PassError::MissingProgram);
            }
            Ok(())
        }

        fn execute(&mut self, ctx: &mut FrameContext<'_, CpuBackend>) -> Result<()> {
            self.log
                .borrow_mut()
                .push(format!("{}:execute:{}x{}", self.name, ctx.camera.width, ctx.camera.height));
            if self.fail_execute {
                return Err(PassError::NotInitialized);
            }
            Ok(())
        }

        fn cleanup(&mut self, _backend: &mut CpuBackend) {
            self.log.borrow_mut().push(format!("{}:cleanup", self.name));
        }
    }

    #[test]
    fn setup_runs_once_before_first_frame() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut backend = CpuBackend::new();
        let mut volume = PassVolume::<CpuBackend>::new().with_pass(Probe::boxed("a", &log));
        let mut out = Image::new(2, 2);

        assert_eq!(volume.state(), VolumeState::Uninitialized);
        volume.render_frame(&mut backend, Viewport::new(2, 2), &mut out).unwrap();
        volume.render_frame(&mut backend, Viewport::new(2, 2), &mut out).unwrap();

        assert_eq!(volume.state(), VolumeState::Ready);
        assert_eq!(volume.frames(), 2);
        assert_eq!(
            *log.borrow(),
            vec!["a:setup", "a:execute:2x2", "a:execute:2x2"]
        );
        assert_eq!(backend.stats().submits, 2);
    }

    #[test]
    fn disabled_pass_is_skipped() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut backend = CpuBackend::new();
        let mut volume = PassVolume::<CpuBackend>::new()
            .with_pass(Probe::boxed("a", &log))
            .with_pass(Probe::boxed("b", &log));
        assert!(volume.set_enabled(0, false));
        assert!(!volume.set_enabled(7, false));
        assert_eq!(volume.is_enabled(0), Some(false));

        let mut out = Image::new(1, 1);
        volume.render_frame(&mut backend, Viewport::new(1, 1), &mut out).unwrap();

        assert_eq!(*log.borrow(), vec!["a:setup", "b:setup", "b:execute:1x1"]);
    }

    #[test]
    fn teardown_is_idempotent_and_final() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut backend = CpuBackend::new();
        let mut volume = PassVolume::<CpuBackend>::new().with_pass(Probe::boxed("a", &log));

        volume.teardown(&mut backend);
        volume.teardown(&mut backend);
        assert_eq!(volume.state(), VolumeState::TornDown);
        assert_eq!(*log.borrow(), vec!["a:cleanup"]);

        let mut out = Image::new(1, 1);
        assert!(matches!(
            volume.render_frame(&mut backend, Viewport::new(1, 1), &mut out),
            Err(PassError::TornDown)
        ));
    }

    #[test]
    fn failed_setup_is_final() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut backend = CpuBackend::new();
        let mut failing = Probe::boxed("b", &log);
        failing.fail_setup = true;
        let mut volume = PassVolume::<CpuBackend>::new()
            .with_pass(Probe::boxed("a", &log))
            .with_pass(failing)
            .with_pass(Probe::boxed("c", &log));

        let mut out = Image::new(1, 1);
        assert!(matches!(
            volume.render_frame(&mut backend, Viewport::new(1, 1), &mut out),
            Err(PassError::MissingProgram)
        ));
        for _ in 0..2 {
            assert!(matches!(
                volume.render_frame(&mut backend, Viewport::new(1, 1), &mut out),
                Err(PassError::SetupFailed { .. })
            ));
        }
        volume.teardown(&mut backend);

        assert_eq!(volume.state(), VolumeState::TornDown);
        assert_eq!(volume.frames(), 0);
        assert_eq!(backend.stats().submits, 0);
        assert_eq!(*log.borrow(), vec!["a:setup", "b:setup", "a:cleanup"]);
    }

    #[test]
    fn failed_execute_discards_frame() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut backend = CpuBackend::new();
        let mut failing = Probe::boxed("a", &log);
        failing.fail_execute = true;
        let mut volume = PassVolume::<CpuBackend>::new()
            .with_pass(failing)
            .with_pass(Probe::boxed("b", &log));

        let mut out = Image::new(1, 1);
        assert!(volume
            .render_frame(&mut backend, Viewport::new(1, 1), &mut out)
            .is_err());

        assert_eq!(backend.stats().discards, 1);
        assert_eq!(backend.stats().submits, 0);
        assert_eq!(volume.frames(), 0);
        assert_eq!(*log.borrow(), vec!["a:setup", "b:setup", "a:execute:1x1"]);
    }
}

use crate::error::Result;

/// When a hook fires, relative to the step counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTrigger {
    /// Exactly at step `n`.
    At(u64),
    /// Every step strictly between `after` and `before`.
    Between { after: u64, before: u64 },
    /// Every `n`th step.
    Every(u64),
    /// On the final step, when one is configured.
    Final,
}

impl StepTrigger {
    pub fn matches(self, step: u64, final_step: Option<u64>) -> bool {
        match self {
            StepTrigger::At(n) => step == n,
            StepTrigger::Between { after, before } => step > after && step < before,
            StepTrigger::Every(n) => n > 0 && step % n == 0,
            StepTrigger::Final => final_step == Some(step),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Running,
    Finished,
}

pub type HookFn<C> = Box<dyn FnMut(&mut C, u64) -> Result<()>>;

struct Hook<C> {
    label: String,
    trigger: StepTrigger,
    action: HookFn<C>,
}

/// Step-counted discrete-event schedule. Hooks run synchronously, in registration order,
/// on the exact step their trigger matches.
pub struct TickDriver<C> {
    step: u64,
    elapsed: f32,
    final_step: Option<u64>,
    hooks: Vec<Hook<C>>,
}

impl<C> Default for TickDriver<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> TickDriver<C> {
    pub fn new() -> Self {
        Self { step: 0, elapsed: 0.0, final_step: None, hooks: Vec::new() }
    }

    /// Finish once the counter reaches `final_step`.
    pub fn with_final_step(final_step: u64) -> Self {
        Self { final_step: Some(final_step), ..Self::new() }
    }

    pub fn add_hook(
        &mut self,
        label: impl Into<String>,
        trigger: StepTrigger,
        action: impl FnMut(&mut C, u64) -> Result<()> + 'static,
    ) {
        self.hooks.push(Hook { label: label.into(), trigger, action: Box::new(action) });
    }

    pub fn hook_labels(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(|hook| hook.label.as_str())
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn final_step(&self) -> Option<u64> {
        self.final_step
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed
    }

    pub fn is_finished(&self) -> bool {
        self.final_step.is_some_and(|last| self.step >= last)
    }

    /// Advance one frame and fire matching hooks. A hook error stops the remaining hooks of
    /// this step and is returned as is.
    pub fn tick(&mut self, ctx: &mut C, dt: f32) -> Result<TickStatus> {
        if self.is_finished() {
            return Ok(TickStatus::Finished);
        }
        self.step += 1;
        self.elapsed += dt;
        let step = self.step;
        let final_step = self.final_step;
        for hook in self.hooks.iter_mut() {
            if hook.trigger.matches(step, final_step) {
                log::trace!("step {step}: {}", hook.label);
                (hook.action)(ctx, step)?;
            }
        }
        Ok(if self.is_finished() { TickStatus::Finished } else { TickStatus::Running })
    }

    /// Rewind the counter for another run, keeping the hooks.
    pub fn reset(&mut self) {
        self.step = 0;
        self.elapsed = 0.0;
    }
}

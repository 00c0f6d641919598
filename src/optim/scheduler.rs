//! Learning rate schedulers
//!
//! Every scheduler is stepped once per optimizer update. The learning rate at
//! update `t` is a pure function of `t`, so a schedule can be previewed
//! without running it.

use crate::config::{SchedulerKind, SolverConfig, ValidationError};
use crate::error::Result;
use std::f64::consts::PI;

/// Learning rate scheduler trait
pub trait LRScheduler {
    /// Learning rate after `step` updates
    fn lr_at(&self, step: usize) -> f64;

    /// Updates taken so far
    fn current_step(&self) -> usize;

    /// Step the scheduler (called after each optimizer update)
    fn step(&mut self);

    /// Get the current learning rate
    fn get_lr(&self) -> f64 {
        self.lr_at(self.current_step())
    }
}

fn linear_warmup(step: usize, warmup: usize, init_lr: f64, lr: f64) -> f64 {
    init_lr + step as f64 * (lr - init_lr) / warmup as f64
}

/// Constant learning rate, used when no scheduler is configured
pub struct ConstantLR {
    lr: f64,
    current_step: usize,
}

impl ConstantLR {
    pub fn new(lr: f64) -> Self {
        Self { lr, current_step: 0 }
    }
}

impl LRScheduler for ConstantLR {
    fn lr_at(&self, _step: usize) -> f64 {
        self.lr
    }

    fn current_step(&self) -> usize {
        self.current_step
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

/// Multiplies the learning rate by `gamma` every `step_size` updates
pub struct StepLR {
    lr: f64,
    step_size: usize,
    gamma: f64,
    current_step: usize,
}

impl StepLR {
    pub fn new(lr: f64, step_size: usize, gamma: f64) -> Self {
        Self {
            lr,
            step_size: step_size.max(1),
            gamma,
            current_step: 0,
        }
    }
}

impl LRScheduler for StepLR {
    fn lr_at(&self, step: usize) -> f64 {
        self.lr * self.gamma.powf((step / self.step_size) as f64)
    }

    fn current_step(&self) -> usize {
        self.current_step
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

/// Multiplies the learning rate by `lr_decay` every update
pub struct ExponentialLR {
    lr: f64,
    lr_decay: f64,
    current_step: usize,
}

impl ExponentialLR {
    pub fn new(lr: f64, lr_decay: f64) -> Self {
        Self {
            lr,
            lr_decay,
            current_step: 0,
        }
    }
}

impl LRScheduler for ExponentialLR {
    fn lr_at(&self, step: usize) -> f64 {
        self.lr * self.lr_decay.powf(step as f64)
    }

    fn current_step(&self) -> usize {
        self.current_step
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

/// Cosine schedule with linear warmup
///
/// Formula after warmup, with `s = (t - warmup) / (total - warmup)`:
/// lr_t = lr * (r + 0.5 * (1 - r) * (1 + cos(π * s / cycle_length)))
///
/// Where `r` is `lr_min_ratio`. Past `total` the rate stays at `lr * r`.
pub struct CosineLR {
    lr: f64,
    warmup: usize,
    total_steps: usize,
    lr_min_ratio: f64,
    cycle_length: f64,
    current_step: usize,
}

impl CosineLR {
    pub fn new(lr: f64, warmup: usize, total_steps: usize, lr_min_ratio: f64, cycle_length: f64) -> Self {
        Self {
            lr,
            warmup,
            total_steps,
            lr_min_ratio,
            cycle_length,
            current_step: 0,
        }
    }
}

impl LRScheduler for CosineLR {
    fn lr_at(&self, step: usize) -> f64 {
        let ratio = if step < self.warmup {
            step as f64 / self.warmup as f64
        } else if step <= self.total_steps {
            let span = self.total_steps.saturating_sub(self.warmup).max(1) as f64;
            let s = (step - self.warmup) as f64 / span;
            self.lr_min_ratio
                + 0.5 * (1.0 - self.lr_min_ratio) * (1.0 + (PI * s / self.cycle_length).cos())
        } else {
            self.lr_min_ratio
        };
        ratio * self.lr
    }

    fn current_step(&self) -> usize {
        self.current_step
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

/// Polynomial decay to `end_lr`, after an optional zero-lr phase and warmup
pub struct PolyDecayLR {
    lr: f64,
    warmup: usize,
    zero_lr_warmup_steps: usize,
    total_steps: usize,
    end_lr: f64,
    power: f64,
    current_step: usize,
}

impl PolyDecayLR {
    pub fn new(
        lr: f64,
        warmup: usize,
        zero_lr_warmup_steps: usize,
        total_steps: usize,
        end_lr: f64,
        power: f64,
    ) -> Self {
        Self {
            lr,
            warmup,
            zero_lr_warmup_steps,
            total_steps,
            end_lr,
            power,
            current_step: 0,
        }
    }
}

impl LRScheduler for PolyDecayLR {
    fn lr_at(&self, step: usize) -> f64 {
        let zero = self.zero_lr_warmup_steps;
        if step < zero {
            return 0.0;
        }
        let warmup_end = zero.saturating_add(self.warmup);
        if step < warmup_end {
            return (step - zero) as f64 / self.warmup as f64 * self.lr;
        }
        if step >= self.total_steps {
            return self.end_lr;
        }
        let decay_steps = self.total_steps.saturating_sub(warmup_end).max(1) as f64;
        let pct_remaining = 1.0 - (step - warmup_end) as f64 / decay_steps;
        (self.lr - self.end_lr) * pct_remaining.powf(self.power) + self.end_lr
    }

    fn current_step(&self) -> usize {
        self.current_step
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

/// Linear warmup from `warmup_init_lr`, then inverse square root decay
///
/// Formula after warmup: lr_t = lr * sqrt(warmup) / sqrt(t)
pub struct InverseSqrtLR {
    lr: f64,
    warmup: usize,
    warmup_init_lr: f64,
    current_step: usize,
}

impl InverseSqrtLR {
    pub fn new(lr: f64, warmup: usize, warmup_init_lr: f64) -> Self {
        Self {
            lr,
            warmup: warmup.max(1),
            warmup_init_lr,
            current_step: 0,
        }
    }
}

impl LRScheduler for InverseSqrtLR {
    fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup {
            linear_warmup(step, self.warmup, self.warmup_init_lr, self.lr)
        } else {
            self.lr * (self.warmup as f64).sqrt() / (step as f64).sqrt()
        }
    }

    fn current_step(&self) -> usize {
        self.current_step
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

/// Linear warmup from `warmup_init_lr`, then constant
pub struct LinearWarmupLR {
    lr: f64,
    warmup: usize,
    warmup_init_lr: f64,
    current_step: usize,
}

impl LinearWarmupLR {
    pub fn new(lr: f64, warmup: usize, warmup_init_lr: f64) -> Self {
        Self {
            lr,
            warmup,
            warmup_init_lr,
            current_step: 0,
        }
    }
}

impl LRScheduler for LinearWarmupLR {
    fn lr_at(&self, step: usize) -> f64 {
        if step < self.warmup {
            linear_warmup(step, self.warmup, self.warmup_init_lr, self.lr)
        } else {
            self.lr
        }
    }

    fn current_step(&self) -> usize {
        self.current_step
    }

    fn step(&mut self) {
        self.current_step += 1;
    }
}

fn schedule_error(kind: SchedulerKind, reason: &str) -> ValidationError {
    ValidationError::InvalidSchedule {
        scheduler: kind.as_str().to_string(),
        reason: reason.to_string(),
    }
}

/// Build the scheduler selected by `schedule.lr_scheduler`
pub fn build_scheduler(config: &SolverConfig) -> Result<Box<dyn LRScheduler>> {
    let lr = config.optim.lr;
    let schedule = &config.schedule;
    let Some(kind) = schedule.lr_scheduler else {
        return Ok(Box::new(ConstantLR::new(lr)));
    };
    let total_steps = || {
        config
            .optim
            .total_updates()
            .filter(|&t| t > 0)
            .ok_or_else(|| {
                if config.optim.updates_per_epoch.is_some() && config.optim.total_updates().is_none() {
                    schedule_error(kind, "optim.updates_per_epoch * optim.epochs overflows")
                } else {
                    schedule_error(kind, "needs optim.updates_per_epoch")
                }
            })
    };

    let scheduler: Box<dyn LRScheduler> = match kind {
        SchedulerKind::Step => {
            let step_size = schedule
                .step
                .step_size
                .ok_or_else(|| schedule_error(kind, "step.step_size is not set"))?;
            let gamma = schedule
                .step
                .gamma
                .ok_or_else(|| schedule_error(kind, "step.gamma is not set"))?;
            Box::new(StepLR::new(lr, step_size, gamma))
        }
        SchedulerKind::Exponential => {
            let lr_decay = schedule
                .exponential
                .lr_decay
                .ok_or_else(|| schedule_error(kind, "exponential.lr_decay is not set"))?;
            Box::new(ExponentialLR::new(lr, lr_decay))
        }
        SchedulerKind::Cosine => {
            let cosine = &schedule.cosine;
            Box::new(CosineLR::new(
                lr,
                cosine.warmup.unwrap_or(0),
                total_steps()?,
                cosine.lr_min_ratio,
                cosine.cycle_length,
            ))
        }
        SchedulerKind::PolynomialDecay => {
            let poly = &schedule.polynomial_decay;
            Box::new(PolyDecayLR::new(
                lr,
                poly.warmup.unwrap_or(0),
                poly.zero_lr_warmup_steps,
                total_steps()?,
                poly.end_lr,
                poly.power,
            ))
        }
        SchedulerKind::InverseSqrt => {
            let params = &schedule.inverse_sqrt;
            let warmup = params
                .warmup
                .filter(|&w| w > 0)
                .ok_or_else(|| schedule_error(kind, "inverse_sqrt.warmup must be > 0"))?;
            Box::new(InverseSqrtLR::new(lr, warmup, params.warmup_init_lr))
        }
        SchedulerKind::LinearWarmup => {
            let params = &schedule.linear_warmup;
            Box::new(LinearWarmupLR::new(
                lr,
                params.warmup.unwrap_or(0),
                params.warmup_init_lr,
            ))
        }
    };
    tracing::debug!(scheduler = kind.as_str(), lr, "built learning rate scheduler");
    Ok(scheduler)
}

/// Learning rates at a few points of the schedule
pub fn lr_preview(scheduler: &dyn LRScheduler, steps: &[usize]) -> Vec<(usize, f64)> {
    steps.iter().map(|&s| (s, scheduler.lr_at(s))).collect()
}

/// Preview of the schedule `config` describes at `steps`, plus the last
/// update when the total is known
pub fn schedule_preview(config: &SolverConfig, steps: &[usize]) -> Result<Vec<(usize, f64)>> {
    let scheduler = build_scheduler(config)?;
    let mut steps = steps.to_vec();
    if let Some(total) = config.optim.total_updates() {
        steps.push(total);
    }
    Ok(lr_preview(scheduler.as_ref(), &steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config, LoadRequest};
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_inverse_sqrt_warmup_and_decay() {
        let scheduler = InverseSqrtLR::new(5e-4, 3000, 0.0);
        assert_abs_diff_eq!(scheduler.lr_at(0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(1500), 2.5e-4, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(3000), 5e-4, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(12000), 2.5e-4, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_sqrt_is_continuous_at_warmup() {
        let scheduler = InverseSqrtLR::new(1.0, 100, 0.1);
        let before = scheduler.lr_at(99);
        let after = scheduler.lr_at(100);
        assert!(before < after);
        assert_abs_diff_eq!(after, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cosine_shape() {
        let scheduler = CosineLR::new(1.0, 10, 110, 0.1, 1.0);
        assert_abs_diff_eq!(scheduler.lr_at(5), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(10), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(60), 0.55, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(110), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(500), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_cosine_decreases_after_warmup() {
        let scheduler = CosineLR::new(1.0, 0, 100, 0.0, 1.0);
        let mut prev = scheduler.lr_at(0);
        for step in 1..=100 {
            let lr = scheduler.lr_at(step);
            assert!(lr <= prev, "step {step}: {lr} > {prev}");
            prev = lr;
        }
    }

    #[test]
    fn test_polynomial_decay_phases() {
        let scheduler = PolyDecayLR::new(1.0, 10, 5, 115, 0.0, 1.0);
        assert_abs_diff_eq!(scheduler.lr_at(3), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(10), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(15), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(65), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(115), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_step_and_exponential() {
        let step = StepLR::new(1.0, 10, 0.5);
        assert_abs_diff_eq!(step.lr_at(9), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(step.lr_at(25), 0.25, epsilon = 1e-12);

        let exp = ExponentialLR::new(1.0, 0.9);
        assert_abs_diff_eq!(exp.lr_at(2), 0.81, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_warmup_then_constant() {
        let scheduler = LinearWarmupLR::new(1.0, 4, 0.2);
        assert_abs_diff_eq!(scheduler.lr_at(2), 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(scheduler.lr_at(40), 1.0, epsilon = 1e-12);

        let no_warmup = LinearWarmupLR::new(1.0, 0, 0.0);
        assert_abs_diff_eq!(no_warmup.lr_at(0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stepping_advances_get_lr() {
        let mut scheduler = InverseSqrtLR::new(1.0, 4, 0.0);
        assert_abs_diff_eq!(scheduler.get_lr(), 0.0, epsilon = 1e-12);
        scheduler.step();
        scheduler.step();
        assert_eq!(scheduler.current_step(), 2);
        assert_abs_diff_eq!(scheduler.get_lr(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_build_from_shipped_config() {
        let config = load_config(&LoadRequest::default()).unwrap();
        let scheduler = build_scheduler(&config).unwrap();
        assert_abs_diff_eq!(scheduler.lr_at(3000), 0.0005, epsilon = 1e-12);
        assert!(scheduler.lr_at(100_000) < 0.0005);
    }

    #[test]
    fn test_build_without_scheduler_is_constant() {
        let config = load_config(&LoadRequest::audiogen(["schedule.lr_scheduler=null"])).unwrap();
        let scheduler = build_scheduler(&config).unwrap();
        let preview = lr_preview(scheduler.as_ref(), &[0, 10, 1000]);
        assert!(preview.iter().all(|&(_, lr)| (lr - 0.0005).abs() < 1e-12));
    }

    #[test]
    fn test_build_cosine_uses_total_updates() {
        let config = load_config(&LoadRequest::audiogen([
            "schedule.lr_scheduler=cosine",
            "optim.epochs=2",
            "optim.updates_per_epoch=50",
        ]))
        .unwrap();
        let scheduler = build_scheduler(&config).unwrap();
        assert_abs_diff_eq!(scheduler.lr_at(100), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_step_decay_with_large_quotient() {
        let step = StepLR::new(1.0, 1, 0.5);
        let far = i32::MAX as usize + 10;
        assert_abs_diff_eq!(step.lr_at(far), 0.0, epsilon = 1e-12);
        assert!(step.lr_at(usize::MAX).is_finite());
    }

    #[test]
    fn test_polynomial_decay_with_huge_warmup() {
        let scheduler = PolyDecayLR::new(1.0, usize::MAX, 5, 100, 0.0, 1.0);
        assert_abs_diff_eq!(scheduler.lr_at(2), 0.0, epsilon = 1e-12);
        assert!(scheduler.lr_at(usize::MAX).is_finite());
    }

    #[test]
    fn test_build_reports_total_updates_overflow() {
        let config = load_config(&LoadRequest::audiogen([
            "schedule.lr_scheduler=cosine",
            "optim.updates_per_epoch=18446744073709551615",
        ]))
        .unwrap();
        let err = build_scheduler(&config).err().unwrap();
        assert!(err.to_string().contains("overflows"), "{err}");
    }

    #[test]
    fn test_schedule_preview_appends_last_update() {
        let config = load_config(&LoadRequest::audiogen([
            "optim.epochs=2",
            "optim.updates_per_epoch=5000",
        ]))
        .unwrap();
        let preview = schedule_preview(&config, &[0, 3000]).unwrap();
        assert_eq!(preview.len(), 3);
        assert_eq!(preview[2].0, 10_000);
        assert_abs_diff_eq!(preview[1].1, 0.0005, epsilon = 1e-12);
    }

    #[test]
    fn test_schedule_preview_reports_missing_epoch_length() {
        let config = load_config(&LoadRequest::audiogen([
            "schedule.lr_scheduler=cosine",
            "optim.updates_per_epoch=null",
        ]))
        .unwrap();
        let err = schedule_preview(&config, &[0, 1000]).unwrap_err();
        assert!(err.to_string().contains("updates_per_epoch"), "{err}");
    }

    #[test]
    fn test_build_step_requires_parameters() {
        let config = load_config(&LoadRequest::audiogen(["schedule.lr_scheduler=step"])).unwrap();
        assert!(build_scheduler(&config).is_err());
    }
}

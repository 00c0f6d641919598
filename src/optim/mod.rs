//! Learning rate schedules

mod scheduler;

pub use scheduler::{
    build_scheduler, lr_preview, schedule_preview, ConstantLR, CosineLR, ExponentialLR, InverseSqrtLR,
    LRScheduler, LinearWarmupLR, PolyDecayLR, StepLR,
};

/// Engine constants and tunable parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ActionSystemConfig {
    /// Fixed step of periodic tasks, in seconds.
    pub periodic_step: f32,
    /// Blend-out applied when a montage task stops its montage.
    pub montage_stop_blend_out: f32,
    /// Fallback wait before the next notify is assumed, in seconds.
    pub time_to_next_notify: f32,
    /// Ground trace distance used by landing helpers.
    pub distance_to_ground: f32,
    /// Landing velocity used when a landing time is not positive.
    pub fallback_landing_velocity: f32,
}

impl ActionSystemConfig {
    // ===== compile-time constants used as type parameters =====
    /// Hard cap on phases entered in one synchronous chain (Immediate + pending).
    pub const MAX_PHASE_CHAIN: usize = 16;
    /// Upper bound on request batches drained from one component update.
    pub const MAX_REQUEST_ROUNDS: usize = 64;
    /// Upper bound on settle iterations of one engine call.
    pub const MAX_SETTLE_ROUNDS: usize = 1024;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_PERIODIC_STEP: f32 = 0.016;
    pub const DEFAULT_MONTAGE_STOP_BLEND_OUT: f32 = 0.2;
    pub const DEFAULT_TIME_TO_NEXT_NOTIFY: f32 = 1.0;
    pub const DEFAULT_DISTANCE_TO_GROUND: f32 = 1000.0;
    pub const DEFAULT_FALLBACK_LANDING_VELOCITY: f32 = -800.0;

    pub fn new() -> Self {
        Self {
            periodic_step: Self::DEFAULT_PERIODIC_STEP,
            montage_stop_blend_out: Self::DEFAULT_MONTAGE_STOP_BLEND_OUT,
            time_to_next_notify: Self::DEFAULT_TIME_TO_NEXT_NOTIFY,
            distance_to_ground: Self::DEFAULT_DISTANCE_TO_GROUND,
            fallback_landing_velocity: Self::DEFAULT_FALLBACK_LANDING_VELOCITY,
        }
    }

    pub fn with_periodic_step(mut self, step: f32) -> Self {
        self.periodic_step = step;
        self
    }

    /// Periodic step clamped to something the timer queue can schedule.
    pub fn step_duration(&self) -> std::time::Duration {
        crate::task::secs(self.periodic_step.max(0.001))
    }
}

impl Default for ActionSystemConfig {
    fn default() -> Self {
        Self::new()
    }
}

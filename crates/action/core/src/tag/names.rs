//! Names of the tags the engine itself understands.

/// Phases shared by most actions.
pub mod phase {
    pub const BEGIN: &str = "Phase.Action.Begin";
    pub const EXECUTE: &str = "Phase.Action.Execute";
    pub const LANDING: &str = "Phase.Action.Landing";
    pub const RECOVERY: &str = "Phase.Action.Recovery";
    pub const INTERRUPT: &str = "Phase.Action.Interrupt";
    pub const END: &str = "Phase.Action.End";
}

/// Events posted by tasks to their owning action.
pub mod task_event {
    pub const COMPLETED: &str = "Task.Event.Completed";
    pub const CANCELED: &str = "Task.Event.Canceled";
    pub const FAILED: &str = "Task.Event.Failed";
    pub const DELAY_FINISHED: &str = "Task.Event.Delay.Finished";
    pub const PHASE_DELAY_FINISHED: &str = "Task.Event.PhaseDelay.Finished";
    pub const GAMEPLAY_EVENT_RECEIVED: &str = "Task.Event.GameplayEvent.Received";
    pub const INPUT_PRESSED: &str = "Task.Event.Input.Pressed";
    pub const INPUT_RELEASED: &str = "Task.Event.Input.Released";
    pub const INPUT_WAIT_PRESSED: &str = "Task.Event.Input.Wait.Pressed";
    pub const INPUT_WAIT_RELEASED: &str = "Task.Event.Input.Wait.Released";

    pub const MONTAGE_NOTIFY_BEGIN: &str = "Task.Event.Montage.NotifyBegin";
    pub const MONTAGE_NOTIFY_END: &str = "Task.Event.Montage.NotifyEnd";
    pub const MONTAGE_INTERRUPTED: &str = "Task.Event.Montage.Interrupted";
    pub const MONTAGE_BLEND_OUT: &str = "Task.Event.Montage.BlendOut";
    pub const MONTAGE_ENDED: &str = "Task.Event.Montage.Ended";
    pub const MONTAGE_ALREADY_PLAYING: &str = "Task.Event.Montage.AlreadyPlaying";
}

/// Gameplay-wide events.
pub mod event {
    pub const MOVEMENT_STARTED: &str = "Event.Movement.Started";
    pub const MOVEMENT_STOPPED: &str = "Event.Movement.Stopped";
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use action_core::tag::names::{phase, task_event};
use action_core::{
    ActionDefinition, ActionHooks, ActionSystemComponent, ActionSystemConfig, ActionSystemEvent,
    ActionTask, ActiveActionHandle, ActorId, ActorInfo, AnimationEvent, BehaviorKind, Condition,
    ContextPayload, GameplayTag, NetRole, PhaseBehavior, PhaseContext, PhaseData, PhaseTable,
    TaskContext, TaskSpec, TransitionOutcome, TransitionRule,
};

const MONTAGE: &str = "Montages/Blast";

/// Shared record of task end calls: (task name, cancelled).
#[derive(Clone, Default)]
struct EndLog(Arc<Mutex<Vec<(String, bool)>>>);

impl EndLog {
    fn entries(&self) -> Vec<(String, bool)> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.entries().iter().filter(|(n, _)| n == name).count()
    }
}

struct Tracked {
    name: String,
    log: EndLog,
}

impl Tracked {
    fn new(name: &str, log: &EndLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
        }
    }
}

impl ActionTask for Tracked {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_activate(&mut self, _ctx: &mut TaskContext<'_>) {}

    fn on_end(&mut self, cancelled: bool, ctx: &mut TaskContext<'_>) {
        self.log.0.lock().unwrap().push((self.name.clone(), cancelled));
        // Dropped: the task is already ending.
        ctx.post_event("Task.Event.Completed", ContextPayload::new());
    }
}

/// Starts tracked tasks on phase entry.
struct TrackedHooks {
    log: EndLog,
    on: Vec<(&'static str, &'static str)>,
}

impl ActionHooks for TrackedHooks {
    fn on_phase_enter(&mut self, entered: &GameplayTag, ctx: &mut PhaseContext<'_, '_>) {
        for (phase, name) in &self.on {
            if entered == *phase {
                ctx.run_task(Tracked::new(name, &self.log)).unwrap();
            }
        }
    }
}

fn montage_task() -> PhaseBehavior {
    PhaseBehavior::new(BehaviorKind::RunTask(TaskSpec::PlayMontage {
        montage: Some(MONTAGE.to_string()),
        rate: 1.0,
        start_section: None,
        stop_when_action_ends: true,
    }))
}

fn notify(name: &str, next: &str) -> TransitionRule {
    TransitionRule::on_task_event(task_event::MONTAGE_NOTIFY_BEGIN, next)
        .with_condition(Condition::notify_name(name))
}

/// Begin: StartBlast -> Execute, 3.0 s -> Interrupt.
fn blast_phases(interrupt: PhaseData) -> PhaseTable {
    PhaseTable::new()
        .phase(
            phase::BEGIN,
            PhaseData::new()
                .on_enter(montage_task())
                .rule(notify("StartBlast", phase::EXECUTE))
                .rule(TransitionRule::on_duration_end(3.0, phase::INTERRUPT)),
        )
        .phase(
            phase::EXECUTE,
            PhaseData::new()
                .rule(notify("StartLanding", phase::LANDING))
                .rule(TransitionRule::on_duration_end(2.0, phase::LANDING)),
        )
        .phase(
            phase::LANDING,
            PhaseData::new().rule(TransitionRule::on_duration_end(1.5, phase::RECOVERY)),
        )
        .phase(
            phase::RECOVERY,
            PhaseData::new()
                .rule(TransitionRule::on_task_event(task_event::MONTAGE_ENDED, phase::END))
                .rule(TransitionRule::on_duration_end(2.0, phase::END)),
        )
        .phase(phase::INTERRUPT, interrupt)
        .phase(
            phase::END,
            PhaseData::new().on_enter(PhaseBehavior::new(BehaviorKind::EndAction {
                cancelled: false,
            })),
        )
}

fn ending_interrupt() -> PhaseData {
    PhaseData::new()
        .on_enter(PhaseBehavior::new(BehaviorKind::EndAllTasks))
        .rule(TransitionRule::immediate(phase::END))
}

fn holding_interrupt() -> PhaseData {
    PhaseData::new().rule(TransitionRule::manual(phase::END))
}

fn template(phases: PhaseTable) -> action_core::ActionTemplate {
    action_core::ActionTemplate::new(ActionDefinition::new("Blast").with_phases(phases))
}

fn component() -> ActionSystemComponent {
    ActionSystemComponent::new(
        ActorInfo::embodied(ActorId::new(1)),
        NetRole::Authority,
        ActionSystemConfig::default(),
    )
}

fn start(asc: &mut ActionSystemComponent, template: action_core::ActionTemplate) -> ActiveActionHandle {
    let spec = asc.grant_action(Arc::new(template), 1, None);
    asc.try_execute_action(spec, None).expect("activation")
}

fn phase_of(asc: &ActionSystemComponent, handle: ActiveActionHandle) -> Option<String> {
    asc.current_phase(handle).map(|p| p.as_str().to_string())
}

fn entered(events: &[ActionSystemEvent]) -> Vec<(String, Duration)> {
    events
        .iter()
        .filter_map(|event| match event {
            ActionSystemEvent::PhaseChanged { to, at, .. } => Some((to.as_str().to_string(), *at)),
            _ => None,
        })
        .collect()
}

fn ended_count(events: &[ActionSystemEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, ActionSystemEvent::ActionEnded { .. }))
        .count()
}

fn assert_single_phase(asc: &ActionSystemComponent) {
    for entry in asc.active_actions() {
        assert!(entry.instance.phase_invariant_holds(), "{:?}", entry.instance);
        assert_eq!(entry.instance.is_executing(), entry.current_phase().is_some());
    }
}

#[test]
fn timeout_moves_to_interrupt_when_no_notify_arrives() {
    let mut asc = component();
    let handle = start(&mut asc, template(blast_phases(holding_interrupt())));
    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::BEGIN));

    for _ in 0..29 {
        asc.advance(Duration::from_millis(100));
        assert_single_phase(&asc);
    }
    asc.advance(Duration::from_millis(99));
    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::BEGIN));

    asc.advance(Duration::from_millis(1));
    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::INTERRUPT));

    let events = asc.drain_events();
    let changes = entered(&events);
    assert_eq!(
        changes.last(),
        Some(&(phase::INTERRUPT.to_string(), Duration::from_secs(3)))
    );
}

#[test]
fn notify_before_timeout_wins_and_timeout_never_fires() {
    let mut asc = component();
    let handle = start(&mut asc, template(blast_phases(holding_interrupt())));

    asc.advance(Duration::from_millis(1200));
    asc.handle_animation_event(&AnimationEvent::notify_begin(MONTAGE, "StartBlast"));
    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::EXECUTE));

    // Only the Execute timeout stays armed.
    assert_eq!(asc.pending_timers(), 1);

    asc.advance(Duration::from_millis(1900));
    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::EXECUTE));

    let events = asc.drain_events();
    assert!(
        entered(&events)
            .iter()
            .all(|(to, _)| to != phase::INTERRUPT)
    );
    assert_eq!(
        entered(&events).last(),
        Some(&(phase::EXECUTE.to_string(), Duration::from_millis(1200)))
    );
}

#[test]
fn notify_with_other_name_is_ignored() {
    let mut asc = component();
    let handle = start(&mut asc, template(blast_phases(holding_interrupt())));
    asc.drain_events();

    asc.handle_animation_event(&AnimationEvent::notify_begin(MONTAGE, "StartLanding"));
    asc.handle_animation_event(&AnimationEvent::notify_begin("Montages/Other", "StartBlast"));

    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::BEGIN));
    assert!(entered(&asc.drain_events()).is_empty());
}

#[test]
fn immediate_rule_chains_to_end_in_one_call() {
    let log = EndLog::default();
    let hooks_log = log.clone();
    let template = template(blast_phases(ending_interrupt())).with_hooks(move || TrackedHooks {
        log: hooks_log.clone(),
        on: vec![(phase::BEGIN, "BeginTracked"), (phase::EXECUTE, "ExecuteTracked")],
    });

    let mut asc = component();
    let handle = start(&mut asc, template);
    asc.request_phase(handle, phase::EXECUTE);
    asc.drain_events();

    let outcome = asc.request_phase(handle, phase::INTERRUPT);
    assert!(outcome.transitioned());
    assert!(asc.active(handle).is_none());

    let events = asc.drain_events();
    let changes: Vec<String> = entered(&events).into_iter().map(|(to, _)| to).collect();
    assert_eq!(changes, vec![phase::INTERRUPT.to_string(), phase::END.to_string()]);
    assert_eq!(ended_count(&events), 1);

    // Every task ended before the action reported its end.
    let ended_at = events
        .iter()
        .position(|e| matches!(e, ActionSystemEvent::ActionEnded { .. }))
        .unwrap();
    assert!(
        events[ended_at..]
            .iter()
            .all(|e| !matches!(e, ActionSystemEvent::TaskEnded { .. }))
    );
    assert_eq!(log.count("BeginTracked"), 1);
    assert_eq!(log.count("ExecuteTracked"), 1);
}

#[test]
fn cancel_mid_landing_ends_both_tasks_once() {
    let log = EndLog::default();
    let hooks_log = log.clone();
    let template = template(blast_phases(ending_interrupt())).with_hooks(move || TrackedHooks {
        log: hooks_log.clone(),
        on: vec![(phase::LANDING, "LandingA"), (phase::LANDING, "LandingB")],
    });

    let mut asc = component();
    let handle = start(&mut asc, template);
    asc.request_phase(handle, phase::LANDING);
    assert_eq!(asc.active(handle).unwrap().instance.task_count(), 3);

    asc.cancel_action(handle);
    asc.cancel_action(handle);

    let mut entries = log.entries();
    entries.sort();
    assert_eq!(
        entries,
        vec![("LandingA".to_string(), true), ("LandingB".to_string(), true)]
    );
    assert!(asc.active(handle).is_none());

    let events = asc.drain_events();
    assert_eq!(ended_count(&events), 1);
    assert!(events.iter().any(|e| matches!(
        e,
        ActionSystemEvent::ActionEnded { cancelled: true, .. }
    )));
}

#[test]
fn unmatched_events_change_nothing() {
    let mut asc = component();
    let handle = start(&mut asc, template(blast_phases(holding_interrupt())));
    asc.drain_events();

    asc.post_task_event(handle, "Task.Event.Unknown", ContextPayload::new());
    asc.handle_gameplay_event(&GameplayTag::new("Event.Unknown"), &ContextPayload::new());

    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::BEGIN));
    assert!(asc.drain_events().is_empty());
}

#[test]
fn disarmed_timeout_never_reaches_the_next_phase() {
    let phases = PhaseTable::new()
        .phase(
            phase::BEGIN,
            PhaseData::new()
                .rule(TransitionRule::on_duration_end(1.0, phase::INTERRUPT))
                .rule(TransitionRule::manual(phase::EXECUTE)),
        )
        .phase(
            phase::EXECUTE,
            PhaseData::new().rule(TransitionRule::on_duration_end(1.0, phase::RECOVERY)),
        )
        .phase(phase::INTERRUPT, holding_interrupt())
        .phase(phase::RECOVERY, holding_interrupt())
        .phase(phase::END, PhaseData::new());

    let mut asc = component();
    let handle = start(&mut asc, template(phases));
    asc.advance(Duration::from_millis(500));
    asc.request_phase(handle, phase::EXECUTE);

    asc.advance(Duration::from_millis(500));
    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::EXECUTE));
    asc.advance(Duration::from_millis(499));
    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::EXECUTE));
    asc.advance(Duration::from_millis(1));
    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::RECOVERY));
}

#[test]
fn first_registered_rule_wins() {
    let phases = PhaseTable::new()
        .phase(
            phase::BEGIN,
            PhaseData::new()
                .rule(TransitionRule::on_gameplay_event("Event.Hit", phase::EXECUTE))
                .rule(TransitionRule::on_gameplay_event("Event.Hit", phase::LANDING)),
        )
        .phase(phase::EXECUTE, holding_interrupt())
        .phase(phase::LANDING, holding_interrupt())
        .phase(phase::RECOVERY, holding_interrupt())
        .phase(phase::END, PhaseData::new());
    let template = template(phases)
        .with_rule(
            phase::BEGIN,
            TransitionRule::on_gameplay_event("Event.Hit", phase::RECOVERY),
        )
        .with_rule(
            phase::BEGIN,
            TransitionRule::on_gameplay_event("Event.Block", phase::RECOVERY),
        )
        .with_rule(
            phase::BEGIN,
            TransitionRule::on_gameplay_event("Event.Block", phase::LANDING),
        );
    let template = Arc::new(template);

    for _ in 0..8 {
        let mut asc = component();
        let spec = asc.grant_action(Arc::clone(&template), 1, None);
        let handle = asc.try_execute_action(spec, None).unwrap();
        asc.handle_gameplay_event(&GameplayTag::new("Event.Hit"), &ContextPayload::new());
        assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::EXECUTE));

        let mut asc = component();
        let spec = asc.grant_action(Arc::clone(&template), 1, None);
        let handle = asc.try_execute_action(spec, None).unwrap();
        asc.handle_gameplay_event(&GameplayTag::new("Event.Block"), &ContextPayload::new());
        assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::RECOVERY));
    }
}

#[test]
fn every_task_is_ended_by_the_time_the_action_ends() {
    let log = EndLog::default();
    let hooks_log = log.clone();
    let phases = blast_phases(ending_interrupt());
    let template = template(phases)
        .with_hooks(move || TrackedHooks {
            log: hooks_log.clone(),
            on: vec![
                (phase::BEGIN, "Begin"),
                (phase::EXECUTE, "Execute"),
                (phase::LANDING, "Landing"),
                (phase::RECOVERY, "Recovery"),
            ],
        });

    let mut asc = component();
    let handle = start(&mut asc, template);
    asc.handle_animation_event(&AnimationEvent::notify_begin(MONTAGE, "StartBlast"));
    for _ in 0..80 {
        asc.advance(Duration::from_millis(100));
        assert_single_phase(&asc);
    }
    assert!(asc.active(handle).is_none());

    for name in ["Begin", "Execute", "Landing", "Recovery"] {
        assert_eq!(log.count(name), 1, "{name}");
    }
    let events = asc.drain_events();
    let changes: Vec<String> = entered(&events).into_iter().map(|(to, _)| to).collect();
    assert_eq!(
        changes,
        vec![
            phase::BEGIN,
            phase::EXECUTE,
            phase::LANDING,
            phase::RECOVERY,
            phase::END
        ]
    );
    assert_eq!(ended_count(&events), 1);
    assert_eq!(asc.pending_timers(), 0);
}

#[test]
fn immediate_cycle_is_halted_and_cancels_the_action() {
    let phases = PhaseTable::new()
        .phase(phase::BEGIN, PhaseData::new().rule(TransitionRule::immediate(phase::EXECUTE)))
        .phase(phase::EXECUTE, PhaseData::new().rule(TransitionRule::immediate(phase::BEGIN)));

    let mut asc = component();
    let handle = start(&mut asc, template(phases));
    assert!(asc.active(handle).is_none());

    let events = asc.drain_events();
    assert_eq!(entered(&events).len(), 2);
    assert!(events.iter().any(|e| matches!(
        e,
        ActionSystemEvent::ActionEnded { cancelled: true, .. }
    )));
}

#[test]
fn phase_requested_during_entry_runs_in_the_same_chain() {
    struct Skip;
    impl ActionHooks for Skip {
        fn on_phase_enter(&mut self, entered: &GameplayTag, ctx: &mut PhaseContext<'_, '_>) {
            if entered == phase::BEGIN {
                ctx.request_phase(phase::LANDING);
                ctx.request_phase(phase::EXECUTE);
            }
        }
    }

    let mut asc = component();
    let handle = start(
        &mut asc,
        template(blast_phases(holding_interrupt())).with_hooks(|| Skip),
    );
    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::EXECUTE));
    let changes = entered(&asc.drain_events());
    assert_eq!(changes.len(), 2);
}

#[test]
fn ending_a_task_twice_is_harmless() {
    struct Twice {
        log: EndLog,
        results: Arc<Mutex<Vec<bool>>>,
    }
    impl ActionHooks for Twice {
        fn on_phase_enter(&mut self, entered: &GameplayTag, ctx: &mut PhaseContext<'_, '_>) {
            if entered != phase::EXECUTE {
                return;
            }
            let id = ctx.run_task(Tracked::new("Once", &self.log)).unwrap();
            let first = ctx.end_task(id, false);
            let second = ctx.end_task(id, true);
            self.results.lock().unwrap().extend([first, second]);
        }
    }

    let log = EndLog::default();
    let results = Arc::new(Mutex::new(Vec::new()));
    let (hook_log, hook_results) = (log.clone(), Arc::clone(&results));
    let mut asc = component();
    let handle = start(
        &mut asc,
        template(blast_phases(holding_interrupt())).with_hooks(move || Twice {
            log: hook_log.clone(),
            results: Arc::clone(&hook_results),
        }),
    );
    let outcome = asc.request_phase(handle, phase::EXECUTE);
    assert_eq!(
        outcome,
        TransitionOutcome::Transitioned {
            from: GameplayTag::new(phase::BEGIN),
            to: GameplayTag::new(phase::EXECUTE),
        }
    );

    assert_eq!(*results.lock().unwrap(), vec![true, false]);
    assert_eq!(log.entries(), vec![("Once".to_string(), false)]);
}

fn distant_timeout_phases() -> PhaseTable {
    PhaseTable::new()
        .phase(
            phase::BEGIN,
            PhaseData::new().rule(TransitionRule::on_duration_end(1.0e20, phase::END)),
        )
        .phase(
            phase::END,
            PhaseData::new().on_enter(PhaseBehavior::new(BehaviorKind::EndAction {
                cancelled: false,
            })),
        )
}

#[test]
fn unrepresentable_timeout_saturates_instead_of_overflowing() {
    let mut asc = component();
    let handle = start(&mut asc, template(distant_timeout_phases()));
    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::BEGIN));

    asc.advance(Duration::from_secs(3600));
    assert_eq!(phase_of(&asc, handle).as_deref(), Some(phase::BEGIN));
}

#[test]
fn infinite_advance_saturates_the_clock() {
    let mut asc = component();
    let handle = start(&mut asc, template(distant_timeout_phases()));

    asc.advance_secs(f32::INFINITY);
    assert_eq!(asc.now(), Duration::MAX);
    // the saturated timeout is due at the end of time
    assert!(asc.active(handle).is_none());
    assert_eq!(ended_count(&asc.drain_events()), 1);

    asc.advance(Duration::from_secs(1));
    asc.advance_secs(f32::NAN);
    assert_eq!(asc.now(), Duration::MAX);
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use action_core::tag::names::{phase, task_event};
use action_core::{
    ActionDefinition, ActionEnv, ActionSystemComponent, ActionSystemConfig, ActionSystemEvent,
    ActionTemplate, ActivationFailure, ActivationPolicy, ActorId, ActorInfo, AnimationEvent,
    BehaviorKind, Condition, ContextPayload, EffectDriver, GameplayTag, InstancingPolicy,
    LevelTable, NetRole, PayloadValue, PhaseBehavior, PhaseData, PhaseInfo, PhaseTable,
    ReplicationMessage, TagContainer, TaskSpec, TransitionRule,
};

const MONTAGE: &str = "Montages/Blast";

fn simple_phases() -> PhaseTable {
    PhaseTable::new()
        .phase(
            phase::BEGIN,
            PhaseData::new()
                .rule(TransitionRule::on_task_event(
                    task_event::INPUT_PRESSED,
                    phase::EXECUTE,
                ))
                .rule(TransitionRule::manual(phase::END)),
        )
        .phase(
            phase::EXECUTE,
            PhaseData::new().rule(TransitionRule::manual(phase::END)),
        )
        .phase(
            phase::END,
            PhaseData::new().on_enter(PhaseBehavior::new(BehaviorKind::EndAction {
                cancelled: false,
            })),
        )
}

fn definition(name: &str) -> ActionDefinition {
    ActionDefinition::new(name).with_phases(simple_phases())
}

fn grant(asc: &mut ActionSystemComponent, definition: ActionDefinition) -> action_core::ActionSpecHandle {
    asc.grant_action(Arc::new(ActionTemplate::new(definition)), 1, None)
}

fn component(role: NetRole) -> ActionSystemComponent {
    ActionSystemComponent::new(
        ActorInfo::embodied(ActorId::new(7)),
        role,
        ActionSystemConfig::default(),
    )
}

fn tag(name: &str) -> GameplayTag {
    GameplayTag::new(name)
}

fn replication(events: &[ActionSystemEvent]) -> Vec<ReplicationMessage> {
    events
        .iter()
        .filter_map(|event| match event {
            ActionSystemEvent::Replication(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[derive(Default)]
struct LedgerState {
    affordable: bool,
    committed: u32,
    spawned: Vec<ActorId>,
    destroyed: Vec<ActorId>,
    effects: Vec<(String, u32)>,
}

#[derive(Clone, Default)]
struct Ledger(Arc<Mutex<LedgerState>>);

impl Ledger {
    fn affordable() -> Self {
        let ledger = Self::default();
        ledger.0.lock().unwrap().affordable = true;
        ledger
    }
}

impl EffectDriver for Ledger {
    fn can_afford(&self, _owner: ActorId, _action: &str) -> bool {
        self.0.lock().unwrap().affordable
    }

    fn commit_cost(&mut self, _owner: ActorId, _action: &str) {
        self.0.lock().unwrap().committed += 1;
    }

    fn apply_effect_to_self(&mut self, _owner: ActorId, effect: &GameplayTag, level: u32) {
        self.0
            .lock()
            .unwrap()
            .effects
            .push((effect.as_str().to_string(), level));
    }

    fn spawn_actor(&mut self, _owner: ActorId, _class: &str) -> Option<ActorId> {
        let mut state = self.0.lock().unwrap();
        let actor = ActorId::new(100 + state.spawned.len() as u32);
        state.spawned.push(actor);
        Some(actor)
    }

    fn destroy_actor(&mut self, actor: ActorId) {
        self.0.lock().unwrap().destroyed.push(actor);
    }
}

#[test]
fn activation_gate_checks_tags_in_order() {
    let mut asc = component(NetRole::Authority);
    let mut def = definition("Guarded");
    def.activation_blocked_tags = TagContainer::new().with("State.Stunned");
    def.activation_required_tags = TagContainer::new().with("State.Armed");
    let spec = grant(&mut asc, def);

    asc.add_loose_tag("State.Stunned.Hard");
    assert!(matches!(
        asc.try_execute_action(spec, None),
        Err(ActivationFailure::Blocked { .. })
    ));
    asc.remove_loose_tag(&tag("State.Stunned.Hard"));

    assert_eq!(
        asc.can_activate_action(spec),
        Err(ActivationFailure::MissingRequired {
            tags: TagContainer::new().with("State.Armed"),
        })
    );
    asc.add_loose_tag("State.Armed");
    let handle = asc.try_execute_action(spec, None).unwrap();
    assert_eq!(
        asc.try_execute_action(spec, None),
        Err(ActivationFailure::AlreadyActive)
    );

    let failures = asc
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, ActionSystemEvent::ActionFailed { .. }))
        .count();
    assert_eq!(failures, 2);
    assert!(asc.active(handle).is_some());
}

#[test]
fn unknown_spec_and_simulated_proxy_are_refused() {
    let mut asc = component(NetRole::SimulatedProxy);
    let spec = grant(&mut asc, definition("Mirror"));
    assert!(matches!(
        asc.try_execute_action(spec, None),
        Err(ActivationFailure::NetPolicy { .. })
    ));
    let missing = action_core::ActionSpecHandle::new(99);
    assert_eq!(
        asc.can_activate_action(missing),
        Err(ActivationFailure::SpecNotFound(missing))
    );
}

#[test]
fn cost_is_checked_and_committed() {
    let ledger = Ledger::default();
    let mut asc = component(NetRole::Authority)
        .with_env(ActionEnv::default().with_effects(ledger.clone()));
    let spec = grant(&mut asc, definition("Costly"));

    assert_eq!(
        asc.try_execute_action(spec, None),
        Err(ActivationFailure::InsufficientResources)
    );
    ledger.0.lock().unwrap().affordable = true;
    asc.try_execute_action(spec, None).unwrap();
    assert_eq!(ledger.0.lock().unwrap().committed, 1);
}

#[test]
fn identifier_and_granted_tags_are_removed_on_end() {
    let mut asc = component(NetRole::Authority);
    let mut def = definition("Channel").with_identifier("Ability.Channel");
    if let Some(begin) = def.phases.phases.get_mut(&tag(phase::BEGIN)) {
        begin.on_enter.push(PhaseBehavior::new(BehaviorKind::AddTags(
            TagContainer::new().with("State.Casting"),
        )));
    }
    let spec = grant(&mut asc, def);
    asc.add_loose_tag("State.Casting");

    let handle = asc.try_execute_action(spec, None).unwrap();
    assert!(asc.has_tag(&tag("Ability.Channel")));
    assert_eq!(asc.owned_tags().count(&tag("State.Casting")), 2);

    asc.request_phase(handle, phase::END);
    assert!(asc.active(handle).is_none());
    assert!(!asc.has_tag(&tag("Ability.Channel")));
    assert_eq!(asc.owned_tags().count(&tag("State.Casting")), 1);
}

#[test]
fn per_actor_instance_is_reused_across_activations() {
    let mut asc = component(NetRole::Authority);
    let template = Arc::new(ActionTemplate::new(definition("Reused")));
    let spec = asc.grant_action(Arc::clone(&template), 1, None);
    assert_eq!(asc.grant_action(template, 3, None), spec);

    for expected in 1..=3 {
        let handle = asc.try_execute_action(spec, None).unwrap();
        let active = asc.active(handle).unwrap();
        assert_eq!(active.instance.activation_count(), expected);
        asc.end_action(handle);
    }
    assert_eq!(asc.spec(spec).unwrap().activation_count, 3);
}

#[test]
fn cancel_by_tag_spares_untagged_and_excluded_actions() {
    let mut asc = component(NetRole::Authority);
    let mut attack = definition("Attack");
    attack.action_tags = TagContainer::new().with("Ability.Attack.Melee");
    let mut guarded = definition("GuardedAttack");
    guarded.action_tags = TagContainer::new()
        .with("Ability.Attack.Heavy")
        .with("Ability.Uncancellable");
    let mut walk = definition("Walk");
    walk.action_tags = TagContainer::new().with("Ability.Move");

    let attack = grant(&mut asc, attack);
    let guarded = grant(&mut asc, guarded);
    let walk = grant(&mut asc, walk);
    for spec in [attack, guarded, walk] {
        asc.try_execute_action(spec, None).unwrap();
    }

    assert_eq!(
        asc.cancel_actions(&TagContainer::new(), &TagContainer::new()),
        0
    );
    let cancelled = asc.cancel_actions(
        &TagContainer::new().with("Ability.Attack"),
        &TagContainer::new().with("Ability.Uncancellable"),
    );
    assert_eq!(cancelled, 1);
    assert!(!asc.is_active(attack));
    assert!(asc.is_active(guarded));
    assert!(asc.is_active(walk));
}

#[test]
fn phase_entry_cancels_other_tagged_actions() {
    let mut asc = component(NetRole::Authority);
    let mut walk = definition("Walk");
    walk.action_tags = TagContainer::new().with("Ability.Move");
    let walk = grant(&mut asc, walk);

    let mut slam = definition("Slam");
    slam.action_tags = TagContainer::new().with("Ability.Move.Leap");
    if let Some(execute) = slam.phases.phases.get_mut(&tag(phase::EXECUTE)) {
        execute.cancel_actions_with_tag = TagContainer::new().with("Ability.Move");
    }
    let slam = grant(&mut asc, slam);

    asc.try_execute_action(walk, None).unwrap();
    let handle = asc.try_execute_action(slam, None).unwrap();
    asc.request_phase(handle, phase::EXECUTE);

    assert!(!asc.is_active(walk));
    assert!(asc.is_active(slam));
}

#[test]
fn non_instanced_actions_finish_in_one_call() {
    let mut asc = component(NetRole::Authority);
    let mut def = definition("Instant").with_instancing(InstancingPolicy::NonInstanced);
    if let Some(begin) = def.phases.phases.get_mut(&tag(phase::BEGIN)) {
        begin.on_enter.push(PhaseBehavior::new(BehaviorKind::RunTask(
            TaskSpec::WaitDelay { duration: 1.0 },
        )));
    }
    let spec = grant(&mut asc, def);

    let handle = asc.try_execute_action(spec, None).unwrap();
    assert!(asc.active(handle).is_none());
    assert_eq!(asc.pending_timers(), 0);

    let events = asc.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        ActionSystemEvent::ActionEnded { cancelled: false, .. }
    )));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ActionSystemEvent::TaskEnded { .. }))
    );
}

#[test]
fn grant_and_remove_drops_the_spec_after_its_activation() {
    let mut asc = component(NetRole::Authority);
    let def = definition("OneShot")
        .with_instancing(InstancingPolicy::InstancedPerExecution)
        .with_activation(ActivationPolicy::OnGrantAndRemove);
    let spec = grant(&mut asc, def);
    let handle = asc.active_for_spec(spec).map(|a| a.handle).unwrap();

    asc.request_phase(handle, phase::END);
    assert!(asc.spec(spec).is_none());
}

#[test]
fn gameplay_event_triggers_activation_with_payload() {
    let mut asc = component(NetRole::Authority);
    let mut def = definition("Stagger");
    def.event_trigger_tags = TagContainer::new().with("Event.Hit.Heavy");
    let spec = grant(&mut asc, def);

    asc.handle_gameplay_event(&tag("Event.Hit"), &ContextPayload::new());
    assert!(!asc.is_active(spec));

    let payload = ContextPayload::new().with("Magnitude", PayloadValue::Float(2.5));
    asc.handle_gameplay_event(&tag("Event.Hit.Heavy"), &payload);
    let active = asc.active_for_spec(spec).unwrap();
    assert_eq!(active.instance.payload().float("Magnitude"), Some(2.5));
    assert_eq!(active.instance.payload().spec(), Some((spec, 1)));
}

#[test]
fn input_activates_then_feeds_the_running_action() {
    let mut asc = component(NetRole::Authority);
    let input = tag("Input.Ability.Primary");
    let spec = asc.grant_action(
        Arc::new(ActionTemplate::new(definition("Primary"))),
        1,
        Some(input.clone()),
    );

    asc.input_pressed(&input);
    let handle = asc.active_for_spec(spec).map(|a| a.handle).unwrap();
    assert_eq!(asc.current_phase(handle).unwrap(), phase::BEGIN);

    asc.input_pressed(&input);
    assert_eq!(asc.current_phase(handle).unwrap(), phase::EXECUTE);
    asc.input_released(&input);
    assert!(asc.is_active(spec));
    assert!(!asc.spec(spec).unwrap().input_held);
}

#[test]
fn while_input_active_cancels_on_release() {
    let mut asc = component(NetRole::Authority);
    let input = tag("Input.Ability.Block");
    let def = definition("Block").with_activation(ActivationPolicy::WhileInputActive);
    let spec = asc.grant_action(Arc::new(ActionTemplate::new(def)), 1, Some(input.clone()));

    asc.input_pressed(&input);
    assert!(asc.is_active(spec));
    asc.input_released(&input);
    assert!(!asc.is_active(spec));
}

#[test]
fn cooldown_blocks_until_it_expires() {
    let mut asc = component(NetRole::Authority);
    let mut def = definition("Dash").with_cooldown("Cooldown.Dash", 1.0);
    def.apply_cooldown_on_start = true;
    let spec = grant(&mut asc, def);

    let handle = asc.try_execute_action(spec, None).unwrap();
    asc.end_action(handle);
    assert_eq!(
        asc.try_execute_action(spec, None),
        Err(ActivationFailure::OnCooldown {
            tag: tag("Cooldown.Dash")
        })
    );

    asc.advance(Duration::from_millis(999));
    assert!(asc.can_activate_action(spec).is_err());
    asc.advance(Duration::from_millis(1));
    assert!(asc.can_activate_action(spec).is_ok());
}

#[test]
fn missing_level_row_ends_the_action() {
    let mut asc = component(NetRole::Authority);
    let def = definition("Scaled").with_level_table(
        LevelTable::new().with_row(1, [("Damage", 10.0)]),
    );
    let template = Arc::new(ActionTemplate::new(def));
    let spec = asc.grant_action(template, 2, None);

    let handle = asc.try_execute_action(spec, None).unwrap();
    assert!(asc.active(handle).is_none());
    let events = asc.drain_events();
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ActionSystemEvent::PhaseChanged { .. }))
    );
    assert!(events.iter().any(|e| matches!(
        e,
        ActionSystemEvent::ActionEnded { cancelled: true, .. }
    )));
}

#[test]
fn avatar_is_required_and_on_spawn_actions_wait_for_it() {
    let mut asc = ActionSystemComponent::new(
        ActorInfo::without_avatar(ActorId::new(3)),
        NetRole::Authority,
        ActionSystemConfig::default(),
    );
    let passive = grant(&mut asc, definition("Passive").with_activation(ActivationPolicy::OnSpawn));
    let handle = asc.try_execute_action(passive, None).unwrap();
    assert!(asc.active(handle).is_none());

    asc.on_avatar_spawned(ActorId::new(4));
    assert!(asc.is_active(passive));
    assert_eq!(asc.actor().avatar, Some(ActorId::new(4)));
}

#[test]
fn spawned_actors_and_effects_go_through_the_collaborator() {
    let ledger = Ledger::affordable();
    let mut asc = component(NetRole::Authority)
        .with_env(ActionEnv::default().with_effects(ledger.clone()));
    let mut def = definition("Totem");
    if let Some(begin) = def.phases.phases.get_mut(&tag(phase::BEGIN)) {
        begin.on_enter.push(PhaseBehavior::server_only(BehaviorKind::SpawnActionActor(
            "Totem".into(),
        )));
        begin.on_enter.push(PhaseBehavior::server_only(BehaviorKind::ApplyEffectToSelf(
            tag("Effect.Haste"),
        )));
        begin.on_enter.push(PhaseBehavior::client_only(BehaviorKind::ApplyEffectToSelf(
            tag("Effect.Cosmetic"),
        )));
    }
    let spec = grant(&mut asc, def);

    let handle = asc.try_execute_action(spec, None).unwrap();
    asc.cancel_action(handle);

    let state = ledger.0.lock().unwrap();
    assert_eq!(state.spawned, vec![ActorId::new(100)]);
    assert_eq!(state.destroyed, vec![ActorId::new(100)]);
    assert_eq!(state.effects, vec![("Effect.Haste".to_string(), 1)]);
}

#[test]
fn predicted_activation_round_trip() {
    let mut client = component(NetRole::AutonomousProxy);
    let mut server = component(NetRole::Authority);
    let spec = grant(&mut client, definition("Strike"));
    assert_eq!(grant(&mut server, definition("Strike")), spec);

    client.try_execute_action(spec, None).unwrap();
    assert_eq!(client.pending_predictions(), 1);
    let outbound = replication(&client.drain_events());
    let [ReplicationMessage::ExecuteRequest { prediction, .. }] = outbound.as_slice() else {
        panic!("expected one execute request, got {outbound:?}");
    };
    let key = *prediction;

    for message in outbound {
        server.handle_replication(message);
    }
    assert!(server.is_active(spec));
    let verdict = replication(&server.drain_events());
    assert_eq!(
        verdict,
        vec![ReplicationMessage::PredictionResult {
            spec,
            key,
            accepted: true
        }]
    );

    for message in verdict {
        client.handle_replication(message);
    }
    assert_eq!(client.pending_predictions(), 0);
    assert!(client.is_active(spec));
}

#[test]
fn rejected_prediction_cancels_the_local_activation() {
    let mut client = component(NetRole::AutonomousProxy);
    let mut server = component(NetRole::Authority);
    let mut def = definition("Strike");
    def.activation_blocked_tags = TagContainer::new().with("State.Silenced");
    let spec = grant(&mut client, def.clone());
    grant(&mut server, def);
    server.add_loose_tag("State.Silenced");

    client.try_execute_action(spec, None).unwrap();
    for message in replication(&client.drain_events()) {
        server.handle_replication(message);
    }
    assert!(!server.is_active(spec));
    for message in replication(&server.drain_events()) {
        client.handle_replication(message);
    }
    assert!(!client.is_active(spec));
    assert_eq!(client.pending_predictions(), 0);
}

#[test]
fn replicated_task_events_are_forwarded_by_the_client() {
    let phases = PhaseTable::new()
        .phase(
            phase::BEGIN,
            PhaseData::new()
                .on_enter(PhaseBehavior::new(BehaviorKind::RunTask(
                    TaskSpec::PlayMontage {
                        montage: Some(MONTAGE.into()),
                        rate: 1.0,
                        start_section: None,
                        stop_when_action_ends: false,
                    },
                )))
                .rule(
                    TransitionRule::on_task_event(task_event::MONTAGE_NOTIFY_BEGIN, phase::EXECUTE)
                        .with_condition(Condition::notify_name("StartBlast")),
                ),
        )
        .phase(
            phase::EXECUTE,
            PhaseData::new().rule(TransitionRule::manual(phase::END)),
        )
        .phase(phase::END, PhaseData::new());
    let mut def = ActionDefinition::new("Blast").with_phases(phases);
    def.replicated_event_tags = TagContainer::new().with(task_event::MONTAGE_NOTIFY_BEGIN);

    let mut client = component(NetRole::AutonomousProxy);
    let mut server = component(NetRole::Authority);
    let spec = grant(&mut client, def.clone());
    grant(&mut server, def);
    client.try_execute_action(spec, None).unwrap();
    for message in replication(&client.drain_events()) {
        server.handle_replication(message);
    }

    client.handle_animation_event(&AnimationEvent::notify_begin(MONTAGE, "StartBlast"));
    let client_handle = client.active_for_spec(spec).unwrap().handle;
    assert_eq!(client.current_phase(client_handle).unwrap(), phase::BEGIN);

    let forwarded = replication(&client.drain_events());
    assert!(matches!(
        forwarded.as_slice(),
        [ReplicationMessage::TaskEvent { .. }]
    ));
    for message in forwarded {
        server.handle_replication(message);
    }
    let server_handle = server.active_for_spec(spec).unwrap().handle;
    assert_eq!(server.current_phase(server_handle).unwrap(), phase::EXECUTE);
}

#[test]
fn replicated_phase_applies_only_when_ahead() {
    let mut client = component(NetRole::AutonomousProxy);
    let spec = grant(&mut client, definition("Sync"));
    let handle = client.try_execute_action(spec, None).unwrap();
    assert_eq!(
        client.active(handle).unwrap().instance.local_phase_counter(),
        1
    );

    let ahead = PhaseInfo {
        phase: tag(phase::EXECUTE),
        counter: 3,
    };
    assert!(client.apply_replicated_phase(spec, &ahead));
    assert_eq!(client.current_phase(handle).unwrap(), phase::EXECUTE);
    assert_eq!(
        client.active(handle).unwrap().instance.local_phase_counter(),
        3
    );

    let stale = PhaseInfo {
        phase: tag(phase::BEGIN),
        counter: 2,
    };
    assert!(!client.apply_replicated_phase(spec, &stale));
    assert_eq!(client.current_phase(handle).unwrap(), phase::EXECUTE);

    let mut server = component(NetRole::Authority);
    let spec = grant(&mut server, definition("Sync"));
    server.try_execute_action(spec, None).unwrap();
    assert!(!server.apply_replicated_phase(spec, &ahead));
}

#[test]
fn refused_execution_reports_the_cause_and_keeps_the_instance() {
    let mut asc = component(NetRole::Authority);
    let def = ActionDefinition::new("Hollow")
        .with_identifier("Ability.Hollow")
        .with_phases(simple_phases().with_initial("Phase.Action.Missing"))
        .with_instancing(InstancingPolicy::InstancedPerActor);
    let spec = grant(&mut asc, def);

    let expected = ActivationFailure::ExecuteRefused(action_core::ActionError::UndefinedPhase {
        action: "Hollow".into(),
        phase: tag("Phase.Action.Missing"),
    });
    assert_eq!(asc.try_execute_action(spec, None), Err(expected.clone()));
    assert!(!asc.is_active(spec));
    assert!(!asc.has_tag(&tag("Ability.Hollow")));
    let granted = asc.spec(spec).unwrap();
    assert!(granted.has_idle_instance());
    assert_eq!(granted.activation_count, 0);

    let events = asc.drain_events();
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ActionSystemEvent::ActionActivated { .. }))
    );
    assert!(events.iter().any(|e| matches!(
        e,
        ActionSystemEvent::ActionFailed { reason, .. } if *reason == expected
    )));

    // A second attempt reports the same cause rather than a busy instance.
    assert_eq!(asc.try_execute_action(spec, None), Err(expected));
}

#[test]
fn wait_input_task_advances_on_the_awaited_release() {
    let mut asc = component(NetRole::Authority);
    let mut def = definition("Charge");
    if let Some(begin) = def.phases.phases.get_mut(&tag(phase::BEGIN)) {
        begin.on_enter.push(PhaseBehavior::new(BehaviorKind::RunTask(TaskSpec::WaitInput {
            edge: action_core::task::InputEdge::Release,
            input: Some(tag("InputTag.Charge")),
        })));
        begin.transitions.insert(
            0,
            TransitionRule::on_task_event(task_event::INPUT_WAIT_RELEASED, phase::EXECUTE),
        );
    }
    let spec = grant(&mut asc, def);
    let handle = asc.try_execute_action(spec, None).unwrap();

    asc.input_released(&tag("InputTag.Other"));
    asc.input_pressed(&tag("InputTag.Charge"));
    assert_eq!(asc.current_phase(handle).unwrap(), phase::BEGIN);

    asc.advance(Duration::from_millis(400));
    asc.input_released(&tag("InputTag.Charge"));
    assert_eq!(asc.current_phase(handle).unwrap(), phase::EXECUTE);
}

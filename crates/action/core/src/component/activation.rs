//! Activation gate, execution and client-side prediction.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{ActionSystemComponent, ActionSystemEvent, ActiveAction, ReplicationMessage};
use crate::action::InstancingPolicy;
use crate::error::{ActivationFailure, ClassifiedError};
use crate::handle::{ActionSpecHandle, ActiveActionHandle, PredictionKey};
use crate::net::NetRole;
use crate::payload::ContextPayload;

impl ActionSystemComponent {
    /// Checks, in order: net role, blocked tags, required tags, cost,
    /// cooldown, a running per-actor instance, a pending prediction.
    pub fn can_activate_action(&self, spec: ActionSpecHandle) -> Result<(), ActivationFailure> {
        let entry = self
            .spec(spec)
            .ok_or(ActivationFailure::SpecNotFound(spec))?;
        let definition = entry.template.definition();

        if self.role == NetRole::SimulatedProxy {
            return Err(ActivationFailure::NetPolicy { role: self.role });
        }

        let blocked = self.owned_tags.matching(&definition.activation_blocked_tags);
        if !blocked.is_empty() {
            return Err(ActivationFailure::Blocked { tags: blocked });
        }
        let missing = self.owned_tags.missing(&definition.activation_required_tags);
        if !missing.is_empty() {
            return Err(ActivationFailure::MissingRequired { tags: missing });
        }

        if !self.env.effects.can_afford(self.actor.owner, entry.name()) {
            return Err(ActivationFailure::InsufficientResources);
        }
        if let Some(cooldown) = &definition.cooldown {
            if self.owned_tags.has_matching_tag(&cooldown.tag) {
                return Err(ActivationFailure::OnCooldown {
                    tag: cooldown.tag.clone(),
                });
            }
        }

        if definition.instancing_policy == InstancingPolicy::InstancedPerActor
            && self.is_active(spec)
        {
            return Err(ActivationFailure::AlreadyActive);
        }
        if self.pending_predictions.values().any(|pending| *pending == spec) {
            return Err(ActivationFailure::PredictionPending);
        }
        Ok(())
    }

    /// Activates `spec`. On an autonomous proxy the activation is predicted
    /// and an execute request is queued for the authority.
    pub fn try_execute_action(
        &mut self,
        spec: ActionSpecHandle,
        trigger: Option<ContextPayload>,
    ) -> Result<ActiveActionHandle, ActivationFailure> {
        if let Err(reason) = self.can_activate_action(spec) {
            self.report_failure(spec, &reason);
            return Err(reason);
        }
        let prediction = (self.role == NetRole::AutonomousProxy).then(|| self.next_prediction.bump());
        let handle = self.activate(spec, prediction, trigger.clone())?;

        if let Some(key) = prediction {
            self.pending_predictions.insert(key, spec);
            debug!(spec = %spec, %key, "activation predicted");
            self.outbox
                .push(ActionSystemEvent::Replication(ReplicationMessage::ExecuteRequest {
                    spec,
                    prediction: key,
                    payload: trigger.unwrap_or_default(),
                }));
        }
        Ok(handle)
    }

    /// Authority side of a predicted activation.
    pub fn handle_execute_request(
        &mut self,
        spec: ActionSpecHandle,
        prediction: PredictionKey,
        payload: ContextPayload,
    ) {
        if !self.role.has_authority() {
            warn!(spec = %spec, role = %self.role, "execute request on non-authority");
            return;
        }
        let trigger = (!payload.is_empty()).then_some(payload);
        let accepted = self.try_execute_action(spec, trigger).is_ok();
        info!(spec = %spec, key = %prediction, accepted, "predicted activation verdict");
        self.outbox
            .push(ActionSystemEvent::Replication(ReplicationMessage::PredictionResult {
                spec,
                key: prediction,
                accepted,
            }));
    }

    pub fn confirm_prediction(&mut self, key: PredictionKey) -> bool {
        let confirmed = self.pending_predictions.remove(&key).is_some();
        if confirmed {
            debug!(%key, "prediction confirmed");
        }
        confirmed
    }

    /// Cancels the predicted activation the authority refused.
    pub fn reject_prediction(&mut self, key: PredictionKey) -> bool {
        let pending = self.pending_predictions.remove(&key).is_some();
        let predicted = self
            .active
            .iter()
            .find(|entry| entry.prediction == Some(key))
            .map(|entry| entry.handle);
        if let Some(handle) = predicted {
            warn!(%key, action = %handle, "prediction rejected, cancelling");
            self.cancel_action(handle);
        }
        pending || predicted.is_some()
    }

    fn activate(
        &mut self,
        spec: ActionSpecHandle,
        prediction: Option<PredictionKey>,
        trigger: Option<ContextPayload>,
    ) -> Result<ActiveActionHandle, ActivationFailure> {
        let Some(entry) = self.specs.iter_mut().find(|entry| entry.handle == spec) else {
            return Err(ActivationFailure::SpecNotFound(spec));
        };
        let owner = self.actor.owner;
        self.env.effects.commit_cost(owner, entry.template.name());

        let instance = entry.take_instance();
        let template = Arc::clone(&entry.template);
        let level = entry.level;
        entry.activation_count += 1;

        let identifier = &template.definition().identifier_tag;
        if identifier.is_valid() {
            self.owned_tags.add_stack(identifier, 1);
        }

        let handle = self.next_active.bump();
        let outbox_mark = self.outbox.len();
        self.active.push(ActiveAction {
            handle,
            spec,
            instance,
            prediction,
            started_at: self.now,
        });
        self.outbox.push(ActionSystemEvent::ActionActivated {
            action: handle,
            spec,
            name: template.name().to_string(),
            prediction,
        });

        let result = self.with_instance(handle, |instance, sys| {
            instance.execute(handle, spec, level, trigger.as_ref(), sys)
        });
        if let Some(Err(error)) = result {
            warn!(action = %template.name(), code = error.error_code(), %error, "execute refused");
            self.outbox.truncate(outbox_mark);
            if identifier.is_valid() {
                self.owned_tags.remove_stack(identifier, 1);
            }
            if let Some(index) = self.active.iter().position(|entry| entry.handle == handle) {
                let entry = self.active.remove(index);
                if let Some(granted) = self.specs.iter_mut().find(|granted| granted.handle == spec) {
                    granted.activation_count = granted.activation_count.saturating_sub(1);
                    granted.return_instance(entry.instance);
                }
            }
            let reason = ActivationFailure::ExecuteRefused(error);
            self.report_failure(spec, &reason);
            return Err(reason);
        }
        self.process_requests();
        Ok(handle)
    }

    fn report_failure(&mut self, spec: ActionSpecHandle, reason: &ActivationFailure) {
        let name = self
            .spec(spec)
            .map(|entry| entry.name().to_string())
            .unwrap_or_default();
        warn!(
            action = %name,
            spec = %spec,
            code = reason.error_code(),
            %reason,
            "activation failed"
        );
        self.outbox.push(ActionSystemEvent::ActionFailed {
            spec,
            name,
            reason: reason.clone(),
        });
    }
}

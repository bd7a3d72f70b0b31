use std::sync::Arc;
use std::time::Duration;

use crate::action::{ActionInstance, ActionTemplate, InstancingPolicy};
use crate::handle::{ActionSpecHandle, ActiveActionHandle, PredictionKey};
use crate::tag::{GameplayTag, TagContainer};

/// A granted action: template, level and input binding.
#[derive(Debug)]
pub struct ActionSpec {
    pub handle: ActionSpecHandle,
    pub template: Arc<ActionTemplate>,
    pub level: u32,
    pub input_tag: Option<GameplayTag>,
    /// Tags added at grant time, matched together with the template's
    /// action tags by cancel-by-tag requests.
    pub dynamic_tags: TagContainer,
    pub activation_count: u32,
    pub input_held: bool,
    /// Reused instance of an InstancedPerActor spec while it is idle.
    pub(crate) shared_instance: Option<ActionInstance>,
}

impl ActionSpec {
    pub(crate) fn new(
        handle: ActionSpecHandle,
        template: Arc<ActionTemplate>,
        level: u32,
        input_tag: Option<GameplayTag>,
    ) -> Self {
        let shared_instance = (template.definition().instancing_policy
            == InstancingPolicy::InstancedPerActor)
            .then(|| ActionInstance::new(Arc::clone(&template)));
        Self {
            handle,
            template,
            level,
            input_tag,
            dynamic_tags: TagContainer::new(),
            activation_count: 0,
            input_held: false,
            shared_instance,
        }
    }

    pub fn name(&self) -> &str {
        self.template.name()
    }

    pub fn instancing(&self) -> InstancingPolicy {
        self.template.definition().instancing_policy
    }

    /// Action tags plus dynamic tags.
    /// Whether an InstancedPerActor spec holds its reusable instance.
    pub fn has_idle_instance(&self) -> bool {
        self.shared_instance.is_some()
    }

    pub fn tags(&self) -> TagContainer {
        self.template
            .definition()
            .action_tags
            .iter()
            .chain(self.dynamic_tags.iter())
            .cloned()
            .collect()
    }

    /// Instance the next activation runs on.
    pub(crate) fn take_instance(&mut self) -> ActionInstance {
        self.shared_instance
            .take()
            .unwrap_or_else(|| ActionInstance::new(Arc::clone(&self.template)))
    }

    /// Hands an idle instance back; only InstancedPerActor specs keep it.
    pub(crate) fn return_instance(&mut self, instance: ActionInstance) {
        if self.instancing() == InstancingPolicy::InstancedPerActor {
            self.shared_instance = Some(instance);
        }
    }
}

/// An activation currently owned by the component.
#[derive(Debug)]
pub struct ActiveAction {
    pub handle: ActiveActionHandle,
    pub spec: ActionSpecHandle,
    pub instance: ActionInstance,
    pub prediction: Option<PredictionKey>,
    pub started_at: Duration,
}

impl ActiveAction {
    pub fn current_phase(&self) -> Option<&GameplayTag> {
        self.instance.current_phase()
    }
}

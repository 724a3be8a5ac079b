//! Runtime interventions: actor changes scheduled at given steps of every run of a scene.

use crate::error::Result;
use crate::params::{ActorKey, AssetRef};
use crate::scenario::Scenario;
use crate::tick::{StepTrigger, TickDriver};
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intervention {
    /// Push the actor's force on every step strictly between `after` and `before`. `force`
    /// replaces the generated one when given.
    ApplyForce {
        actor: ActorKey,
        after: u64,
        before: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        force: Option<Vec3>,
    },
    SwapMaterial { actor: ActorKey, step: u64, material: AssetRef },
    SwapMesh { actor: ActorKey, step: u64, mesh: AssetRef },
    Hide { actor: ActorKey, step: u64 },
    Show { actor: ActorKey, step: u64 },
    Destroy { actor: ActorKey, step: u64 },
}

impl Intervention {
    pub fn actor(&self) -> ActorKey {
        match self {
            Intervention::ApplyForce { actor, .. }
            | Intervention::SwapMaterial { actor, .. }
            | Intervention::SwapMesh { actor, .. }
            | Intervention::Hide { actor, .. }
            | Intervention::Show { actor, .. }
            | Intervention::Destroy { actor, .. } => *actor,
        }
    }

    pub fn trigger(&self) -> StepTrigger {
        match self {
            Intervention::ApplyForce { after, before, .. } => StepTrigger::Between { after: *after, before: *before },
            Intervention::SwapMaterial { step, .. }
            | Intervention::SwapMesh { step, .. }
            | Intervention::Hide { step, .. }
            | Intervention::Show { step, .. }
            | Intervention::Destroy { step, .. } => StepTrigger::At(*step),
        }
    }

    pub fn label(&self) -> String {
        let action = match self {
            Intervention::ApplyForce { .. } => "force",
            Intervention::SwapMaterial { .. } => "material",
            Intervention::SwapMesh { .. } => "mesh",
            Intervention::Hide { .. } => "hide",
            Intervention::Show { .. } => "show",
            Intervention::Destroy { .. } => "destroy",
        };
        format!("{}.{action}", self.actor())
    }

    pub fn apply(&self, scenario: &mut Scenario) -> Result<()> {
        match self {
            Intervention::ApplyForce { actor, force, .. } => {
                let proxy = scenario.actor_mut(*actor)?;
                if let Some(force) = force {
                    proxy.set_force(*force)?;
                }
                proxy.play_force()
            }
            Intervention::SwapMaterial { actor, material, .. } => {
                let resolved = scenario.factory().resolve(material)?;
                scenario.actor_mut(*actor)?.set_material(resolved)
            }
            Intervention::SwapMesh { actor, mesh, .. } => {
                let resolved = scenario.factory().resolve(mesh)?;
                scenario.actor_mut(*actor)?.set_mesh(resolved)
            }
            Intervention::Hide { actor, .. } => scenario.actor_mut(*actor)?.set_hidden(true),
            Intervention::Show { actor, .. } => scenario.actor_mut(*actor)?.set_hidden(false),
            Intervention::Destroy { actor, .. } => scenario.destroy_actor(*actor),
        }
    }
}

/// Register one hook per intervention, in list order.
pub fn schedule(interventions: &[Intervention], driver: &mut TickDriver<Scenario>) {
    for intervention in interventions {
        let intervention = intervention.clone();
        driver.add_hook(intervention.label(), intervention.trigger(), move |scenario: &mut Scenario, _| {
            intervention.apply(scenario)
        });
    }
}

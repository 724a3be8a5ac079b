use super::{SceneKind, ScenarioVariant};
use crate::params::{ActorKey, ParamTable, Role};
use serde_json::{json, Value};

/// Base environment only: camera, sky, floor, light and optionally walls. Single run.
#[derive(Debug, Default, Clone, Copy)]
pub struct SandBox;

impl ScenarioVariant for SandBox {
    fn name(&self) -> &str {
        "SandBox"
    }

    fn status(&self, _run: u32, _kind: SceneKind, params: &ParamTable) -> Value {
        json!({ "walls": params.contains_key(&ActorKey::single(Role::Walls)) })
    }
}

// src/plan/graph.rs

//! Plan graph: typed steps with literal or wired inputs
//!
//! A step's input is a JSON object. Each field is either a literal value
//! fixed at planning time or a pointer into the output of an earlier step.
//! Wired inputs are hard dependencies; `after` adds ordering-only edges.
//!
//! Execution order is computed with Kahn's algorithm, grouping steps into
//! waves: every step in a wave depends only on steps in earlier waves, so
//! steps of one wave may run concurrently.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use uuid::Uuid;

use super::action::ActionKind;

pub type StepId = usize;

/// Source of one input field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Input {
    Literal { value: Value },
    Output { step: StepId, pointer: String },
}

/// Input fields of a step, built up with chained calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inputs(BTreeMap<String, Input>);

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a literal field
    pub fn literal<T: Serialize>(mut self, name: &str, value: T) -> Result<Self> {
        self.0.insert(
            name.to_string(),
            Input::Literal {
                value: serde_json::to_value(value)?,
            },
        );
        Ok(self)
    }

    /// Wire a field to `pointer` (RFC 6901) within `step`'s output
    pub fn wire(mut self, name: &str, step: StepId, pointer: &str) -> Self {
        self.0.insert(
            name.to_string(),
            Input::Output {
                step,
                pointer: pointer.to_string(),
            },
        );
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Input)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub action: ActionKind,
    pub inputs: Inputs,
    /// Ordering-only predecessors
    #[serde(default)]
    pub after: BTreeSet<StepId>,
    /// Finalize steps run after the main steps, even when the plan failed,
    /// provided every step they take input from completed
    #[serde(default)]
    pub finalize: bool,
}

impl Step {
    /// Steps whose output this step consumes
    pub fn requires(&self) -> BTreeSet<StepId> {
        self.inputs
            .iter()
            .filter_map(|(_, input)| match input {
                Input::Output { step, .. } => Some(*step),
                Input::Literal { .. } => None,
            })
            .collect()
    }

    /// All predecessors: wired and ordering-only
    pub fn dependencies(&self) -> BTreeSet<StepId> {
        let mut deps = self.requires();
        deps.extend(self.after.iter().copied());
        deps
    }

    /// Resolve the step's input object from completed outputs
    pub fn resolve_input(&self, outputs: &BTreeMap<StepId, Value>) -> Result<Value> {
        let mut object = serde_json::Map::new();
        for (name, input) in self.inputs.iter() {
            let value = match input {
                Input::Literal { value } => value.clone(),
                Input::Output { step, pointer } => outputs
                    .get(step)
                    .and_then(|output| output.pointer(pointer))
                    .cloned()
                    .ok_or_else(|| {
                        Error::InvalidInput(format!(
                            "Step {} input '{}' wants {} from step {}, which produced nothing there",
                            self.id, name, pointer, step
                        ))
                    })?,
            };
            object.insert(name.clone(), value);
        }
        Ok(Value::Object(object))
    }
}

/// A plan: the steps of one publish, promote or import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub description: String,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            steps: Vec::new(),
        }
    }

    pub fn add_step(&mut self, action: ActionKind, inputs: Inputs) -> StepId {
        self.push(action, inputs, false)
    }

    pub fn add_finalize_step(&mut self, action: ActionKind, inputs: Inputs) -> StepId {
        self.push(action, inputs, true)
    }

    fn push(&mut self, action: ActionKind, inputs: Inputs, finalize: bool) -> StepId {
        let id = self.steps.len();
        self.steps.push(Step {
            id,
            action,
            inputs,
            after: BTreeSet::new(),
            finalize,
        });
        id
    }

    /// Make `step` wait for `predecessor` without consuming its output
    pub fn order_after(&mut self, step: StepId, predecessor: StepId) -> Result<()> {
        let target = self
            .steps
            .get_mut(step)
            .ok_or_else(|| Error::InvalidInput(format!("No step {}", step)))?;
        target.after.insert(predecessor);
        Ok(())
    }

    pub fn step(&self, id: StepId) -> Result<&Step> {
        self.steps
            .get(id)
            .ok_or_else(|| Error::InvalidInput(format!("No step {}", id)))
    }

    /// Steps of a given kind
    pub fn steps_of(&self, action: ActionKind) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.action == action)
    }

    /// Check references and group main (non-finalize) steps into waves
    pub fn waves(&self) -> Result<Vec<Vec<StepId>>> {
        self.validate()?;
        let main: Vec<&Step> = self.steps.iter().filter(|s| !s.finalize).collect();
        topological_waves(&main)
    }

    /// Finalize steps in dependency order
    pub fn finalize_order(&self) -> Result<Vec<StepId>> {
        let finalize: Vec<&Step> = self.steps.iter().filter(|s| s.finalize).collect();
        Ok(topological_waves(&finalize)?.into_iter().flatten().collect())
    }

    fn validate(&self) -> Result<()> {
        for step in &self.steps {
            for dep in step.dependencies() {
                let Some(predecessor) = self.steps.get(dep) else {
                    return Err(Error::InvalidInput(format!(
                        "Step {} depends on missing step {}",
                        step.id, dep
                    )));
                };
                if dep == step.id {
                    return Err(Error::InvalidInput(format!("Step {} depends on itself", step.id)));
                }
                if predecessor.finalize && !step.finalize {
                    return Err(Error::InvalidInput(format!(
                        "Step {} cannot depend on finalize step {}",
                        step.id, dep
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Kahn's algorithm over a subset of steps; edges to steps outside the subset
/// are treated as already satisfied
fn topological_waves(steps: &[&Step]) -> Result<Vec<Vec<StepId>>> {
    let members: BTreeSet<StepId> = steps.iter().map(|s| s.id).collect();
    let mut in_degree: BTreeMap<StepId, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<StepId, Vec<StepId>> = BTreeMap::new();

    for step in steps {
        let deps: Vec<StepId> = step
            .dependencies()
            .into_iter()
            .filter(|d| members.contains(d))
            .collect();
        in_degree.insert(step.id, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(step.id);
        }
    }

    let mut ready: VecDeque<StepId> = in_degree
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut waves = Vec::new();
    let mut placed = 0;

    while !ready.is_empty() {
        let wave: Vec<StepId> = ready.drain(..).collect();
        placed += wave.len();
        for id in &wave {
            for dependent in dependents.get(id).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(dependent) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push_back(*dependent);
                    }
                }
            }
        }
        waves.push(wave);
    }

    if placed != steps.len() {
        return Err(Error::InvalidInput("Plan contains a dependency cycle".to_string()));
    }
    Ok(waves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diamond() -> Plan {
        let mut plan = Plan::new("test");
        let a = plan.add_step(ActionKind::CreateVersion, Inputs::new());
        let b = plan.add_step(ActionKind::CopyContent, Inputs::new().wire("x", a, "/version_id"));
        let c = plan.add_step(ActionKind::CopyContent, Inputs::new().wire("x", a, "/version_id"));
        let d = plan.add_step(ActionKind::AttachEnvironment, Inputs::new());
        plan.order_after(d, b).unwrap();
        plan.order_after(d, c).unwrap();
        plan
    }

    #[test]
    fn test_waves_group_independent_steps() {
        let waves = diamond().waves().unwrap();
        assert_eq!(waves, vec![vec![0], vec![1, 2], vec![3]]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut plan = Plan::new("cycle");
        let a = plan.add_step(ActionKind::CopyContent, Inputs::new());
        let b = plan.add_step(ActionKind::CopyContent, Inputs::new().wire("x", a, ""));
        plan.order_after(a, b).unwrap();
        assert!(matches!(plan.waves(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_finalize_excluded_from_waves() {
        let mut plan = diamond();
        let f = plan.add_finalize_step(ActionKind::DestroyImporter, Inputs::new().wire("h", 0, "/handle"));
        plan.order_after(f, 3).unwrap();

        let waves = plan.waves().unwrap();
        assert!(waves.iter().flatten().all(|&s| s != f));
        assert_eq!(plan.finalize_order().unwrap(), vec![f]);
    }

    #[test]
    fn test_main_step_cannot_follow_finalize() {
        let mut plan = Plan::new("bad");
        let f = plan.add_finalize_step(ActionKind::DestroyImporter, Inputs::new());
        plan.add_step(ActionKind::CopyContent, Inputs::new().wire("x", f, ""));
        assert!(plan.waves().is_err());
    }

    #[test]
    fn test_resolve_input_follows_pointer() {
        let mut plan = Plan::new("wire");
        let a = plan.add_step(ActionKind::CreateRepos, Inputs::new());
        let b = plan.add_step(
            ActionKind::CopyContent,
            Inputs::new()
                .literal("source", "lib-1")
                .unwrap()
                .wire("target", a, "/clones/1/backend_id"),
        );

        let mut outputs = BTreeMap::new();
        outputs.insert(
            a,
            json!({"clones": [{"backend_id": "c0"}, {"backend_id": "c1"}]}),
        );

        let input = plan.step(b).unwrap().resolve_input(&outputs).unwrap();
        assert_eq!(input, json!({"source": "lib-1", "target": "c1"}));

        assert!(plan.step(b).unwrap().resolve_input(&BTreeMap::new()).is_err());
    }
}

//! Keeping symmetric counterparts in lock-step.
//!
//! Symmetric copies of a slot are independent [`ModelModule`]s. Every
//! mutation is replayed on each member in a fixed order: the primary
//! first, then the counterparts in the order given.

use crate::error::{ModelError, Result};
use crate::module::ModelModule;

/// A primary module and its symmetric counterparts.
pub struct SymmetryGroup<'a> {
    members: Vec<&'a mut ModelModule>,
}

impl<'a> SymmetryGroup<'a> {
    /// Group `primary` with `counterparts`.
    pub fn new(primary: &'a mut ModelModule, counterparts: impl IntoIterator<Item = &'a mut ModelModule>) -> Self {
        let mut members = vec![primary];
        members.extend(counterparts);
        Self { members }
    }

    /// Number of members, including the primary.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; a group has at least its primary.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The primary module.
    pub fn primary(&self) -> &ModelModule {
        &self.members[0]
    }

    /// Run `op` on every member in order.
    pub fn apply<F>(&mut self, mut op: F)
    where
        F: FnMut(&mut ModelModule),
    {
        for member in self.members.iter_mut() {
            op(member);
        }
    }

    /// Run a fallible `op` on every member in order, stopping at the first
    /// failure. Members before the failing one keep their update.
    pub fn try_apply<F>(&mut self, mut op: F) -> Result<()>
    where
        F: FnMut(&mut ModelModule) -> Result<()>,
    {
        for (index, member) in self.members.iter_mut().enumerate() {
            op(member).map_err(|source| ModelError::Counterpart {
                index,
                source: Box::new(source),
            })?;
        }
        Ok(())
    }
}

/// Run `op` on `modules[order[0]]`, `modules[order[1]]`, ... Out-of-range
/// indices are skipped.
pub fn fan_out<F>(modules: &mut [ModelModule], order: &[usize], mut op: F) -> Result<()>
where
    F: FnMut(&mut ModelModule) -> Result<()>,
{
    for (position, &index) in order.iter().enumerate() {
        let Some(module) = modules.get_mut(index) else {
            continue;
        };
        op(module).map_err(|source| ModelError::Counterpart {
            index: position,
            source: Box::new(source),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DefinitionCatalog;
    use crate::layout::ModelDefinitionLayoutOptions;
    use crate::orientation::ModelOrientation;
    use crate::scene::{AssetNode, SceneGraph, SceneHost};
    use crate::settings::EngineSettings;

    fn modules(count: usize) -> Vec<ModelModule> {
        let mut catalog = DefinitionCatalog::new();
        catalog
            .load_str(
                r#"
MODEL_DEFINITION
{
    name = a
    modelName = Assets/A
    maxVerticalScale = 2
}
MODEL_DEFINITION
{
    name = b
    modelName = Assets/B
}
"#,
            )
            .unwrap();
        let options: Vec<_> = catalog
            .get_many(&["a", "b"])
            .into_iter()
            .map(ModelDefinitionLayoutOptions::single)
            .collect();
        (0..count)
            .map(|i| {
                ModelModule::new(
                    format!("slot{}", i),
                    ModelOrientation::Top,
                    options.clone(),
                    &EngineSettings::default(),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn apply_reaches_every_member_in_order() {
        let mut scene = SceneGraph::new();
        scene.register_asset("Assets/B", AssetNode::mesh("B"));
        let parent = scene.create_empty("part", None);
        let mut ms = modules(3);
        let (primary, rest) = ms.split_first_mut().unwrap();
        let mut group = SymmetryGroup::new(primary, rest.iter_mut());
        assert_eq!(group.len(), 3);

        let mut visited = Vec::new();
        group.apply(|m| {
            visited.push(m.slot_name().to_string());
            m.setup_model(&mut scene, parent);
            m.select_definition(&mut scene, "b");
        });
        assert_eq!(visited, vec!["slot0", "slot1", "slot2"]);
        assert_eq!(group.primary().definition().name, "b");
        assert!(ms.iter().all(|m| m.definition().name == "b"));
        assert_eq!(scene.find_descendants(parent, "B").len(), 3);
    }

    #[test]
    fn try_apply_stops_at_first_failure() {
        let mut ms = modules(3);
        let (primary, rest) = ms.split_first_mut().unwrap();
        let mut group = SymmetryGroup::new(primary, rest.iter_mut());
        let mut calls = 0;
        let err = group
            .try_apply(|m| {
                calls += 1;
                if m.slot_name() == "slot1" {
                    return Err(ModelError::UnknownDefinition("c".into()));
                }
                m.set_scale(1.0, 2.0);
                Ok(())
            })
            .unwrap_err();
        assert_eq!(calls, 2);
        assert!(matches!(err, ModelError::Counterpart { index: 1, .. }));
        assert_eq!(ms[0].vertical_scale(), 2.0);
        assert_eq!(ms[2].vertical_scale(), 1.0);
    }

    #[test]
    fn fan_out_follows_given_order() {
        let mut ms = modules(3);
        let mut seen = Vec::new();
        fan_out(&mut ms, &[2, 0, 7, 1], |m| {
            seen.push(m.slot_name().to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["slot2", "slot0", "slot1"]);
    }
}

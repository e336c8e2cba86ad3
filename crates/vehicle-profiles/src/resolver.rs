//! Inheritance resolution
//!
//! A leaf fragment names its parent through `extends`; the parent may name
//! its own parent, forming a singly linked chain. Resolution walks the chain
//! leaf-first, then merges PID tables root-first so that layers closer to the
//! leaf win:
//!
//! 1. Every parameter name a layer declares is removed from all PIDs
//!    accumulated so far.
//! 2. The layer's PIDs are merged by code into the accumulator, or appended
//!    when the code is new.
//! 3. After the last layer, parameters with an empty expression are dropped
//!    (an empty expression disables an inherited parameter), then PIDs left
//!    without parameters are dropped.
//!
//! Only `pids` is layered; every other field comes from the leaf.

use crate::error::CompileError;
use crate::fragment::{PidEntry, ProfileFragment};
use crate::storage::{FragmentSource, normalize_key};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of resolving one leaf fragment
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Keys of the chain, leaf first and root last
    pub chain: Vec<PathBuf>,
    /// The merged fragment; `pids` is `None` only for a lone fragment without one
    pub profile: ProfileFragment,
    /// Fragment each merged parameter came from
    pub origins: ParameterOrigins,
}

/// Key of the fragment that declared each parameter's surviving expression
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterOrigins {
    by_name: HashMap<String, PathBuf>,
}

impl ParameterOrigins {
    /// Attribute every parameter name to the layer nearest the leaf that declares it
    ///
    /// `keys` and `layers` are parallel and given leaf first.
    pub fn from_chain(keys: &[PathBuf], layers: &[ProfileFragment]) -> Self {
        let mut by_name = HashMap::new();
        for (key, layer) in keys.iter().zip(layers) {
            let names = layer
                .pids
                .iter()
                .flatten()
                .flat_map(|pid| pid.parameters.keys());
            for name in names {
                by_name.entry(name.clone()).or_insert_with(|| key.clone());
            }
        }
        Self { by_name }
    }

    /// Fragment that declared `name`, if any layer did
    pub fn origin_of(&self, name: &str) -> Option<&Path> {
        self.by_name.get(name).map(PathBuf::as_path)
    }
}

/// Walks extends chains through a [`FragmentSource`]
pub struct InheritanceResolver<'a, S: FragmentSource + ?Sized> {
    source: &'a S,
    max_depth: usize,
}

impl<'a, S: FragmentSource + ?Sized> InheritanceResolver<'a, S> {
    /// Create a resolver allowing at most `max_depth` ancestors
    pub fn new(source: &'a S, max_depth: usize) -> Self {
        Self { source, max_depth }
    }

    /// Resolve `leaf`, stored under `key`, against its ancestors
    pub async fn resolve(
        &self,
        key: &Path,
        leaf: ProfileFragment,
    ) -> Result<Resolution, CompileError> {
        let (chain, layers) = self.collect_chain(key, leaf).await?;
        debug!(leaf = ?key, depth = chain.len(), "Resolved inheritance chain");

        let origins = ParameterOrigins::from_chain(&chain, &layers);
        let mut profile = merge_layers(layers)
            .ok_or_else(|| CompileError::invalid_fragment(key, "empty inheritance chain"))?;
        if let Some(pids) = profile.pids.as_mut() {
            prune_disabled(pids);
        }

        Ok(Resolution {
            chain,
            profile,
            origins,
        })
    }

    /// Load every ancestor of `leaf`, leaf first
    ///
    /// Rejects chains that revisit a fragment and chains longer than the
    /// configured depth.
    pub async fn collect_chain(
        &self,
        key: &Path,
        leaf: ProfileFragment,
    ) -> Result<(Vec<PathBuf>, Vec<ProfileFragment>), CompileError> {
        let leaf_key = normalize_key(key);
        let mut visited = HashSet::from([leaf_key.clone()]);
        let mut keys = vec![leaf_key.clone()];
        let mut next = leaf.extends.clone();
        let mut layers = vec![leaf];

        while let Some(reference) = next {
            let parent_key = normalize_key(Path::new(&reference));

            if !visited.insert(parent_key.clone()) {
                let chain = keys
                    .iter()
                    .chain(std::iter::once(&parent_key))
                    .map(|k| k.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(CompileError::CyclicInheritance { chain });
            }

            if keys.len() > self.max_depth {
                return Err(CompileError::InheritanceDepthExceeded {
                    leaf: leaf_key,
                    depth: keys.len(),
                    max_depth: self.max_depth,
                });
            }

            let parent = self
                .source
                .load(&parent_key)
                .await
                .map_err(|e| match e {
                    CompileError::InvalidFragment { reason, .. } => CompileError::MalformedAncestor {
                        leaf: leaf_key.clone(),
                        ancestor: parent_key.clone(),
                        reason,
                    },
                    other => other,
                })?;

            next = parent.extends.clone();
            keys.push(parent_key);
            layers.push(parent);
        }

        Ok((keys, layers))
    }
}

/// Merge a chain given leaf first and root last
///
/// A chain of one fragment is returned unchanged. Returns `None` for an
/// empty chain.
pub fn merge_layers(chain: Vec<ProfileFragment>) -> Option<ProfileFragment> {
    let mut layers = chain.into_iter().rev().collect::<Vec<_>>();
    let leaf = layers.pop()?;
    if layers.is_empty() {
        return Some(leaf);
    }

    let mut pids = Vec::new();
    for layer in layers.iter().chain(std::iter::once(&leaf)) {
        if let Some(layer_pids) = layer.pids.as_deref() {
            apply_layer(&mut pids, layer_pids);
        }
    }

    Some(ProfileFragment {
        pids: Some(pids),
        ..leaf
    })
}

/// Merge one layer onto the accumulated PIDs; the layer wins every collision
pub fn apply_layer(accumulated: &mut Vec<PidEntry>, layer: &[PidEntry]) {
    let introduced: HashSet<&str> = layer
        .iter()
        .flat_map(|pid| pid.parameters.keys().map(String::as_str))
        .collect();

    for pid in accumulated.iter_mut() {
        pid.parameters
            .retain(|name, _| !introduced.contains(name.as_str()));
    }

    for pid in layer {
        match accumulated.iter_mut().find(|existing| existing.pid == pid.pid) {
            Some(existing) => {
                existing.parameters.extend(
                    pid.parameters
                        .iter()
                        .map(|(name, expression)| (name.clone(), expression.clone())),
                );
                if pid.pid_init.is_some() {
                    existing.pid_init.clone_from(&pid.pid_init);
                }
                existing.extra.extend(pid.extra.clone());
            }
            None => accumulated.push(pid.clone()),
        }
    }
}

/// Drop parameters disabled with an empty expression, then empty PIDs
pub fn prune_disabled(pids: &mut Vec<PidEntry>) {
    for pid in pids.iter_mut() {
        pid.parameters.retain(|_, expression| !expression.is_empty());
    }
    pids.retain(|pid| !pid.parameters.is_empty());
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`PlanBuilder`]: turns a source/target media pair into a [`crate::Plan`]
//! by consulting a [`CapRegistry`] + [`MediaUrnRegistry`] pair and the
//! [`capns_graph::MediaGraph`] built from them.

use std::collections::HashSet;

use capns_cardinality::analyze_path_cardinality;
use capns_catalog::{Cap, CapCatalog};
use capns_graph::{Edge, MediaGraph};
use capns_media::MediaSpec;
use capns_urn::{CapUrn, MediaUrn};

use crate::binding::ArgumentBinding;
use crate::plan::{Plan, PlanStep};
use crate::registry::{CapRegistry, MediaUrnRegistry};
use crate::PlannerError;

/// Default bound on path length for [`PlanBuilder::find_all_paths`] and
/// [`PlanBuilder::build_plan`]'s best-path search.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Builds conversion plans from a source media type to a target media
/// type, optionally restricted to an allow-list of cap URNs.
pub struct PlanBuilder<C: CapRegistry, M: MediaUrnRegistry> {
    caps: C,
    media: M,
    allow_list: Option<HashSet<CapUrn>>,
}

impl<C: CapRegistry, M: MediaUrnRegistry> PlanBuilder<C, M> {
    /// Build a planner with no allow-list restriction.
    pub fn new(caps: C, media: M) -> Self {
        Self {
            caps,
            media,
            allow_list: None,
        }
    }

    /// Build a planner that only considers caps whose URN appears in
    /// `allow_list`.
    pub fn with_allow_list(caps: C, media: M, allow_list: Vec<CapUrn>) -> Self {
        Self {
            caps,
            media,
            allow_list: Some(allow_list.into_iter().collect()),
        }
    }

    async fn graph(&self) -> Result<MediaGraph, PlannerError> {
        let all_caps = self.caps.all().await?;
        let mut catalog = CapCatalog::new();
        let filtered: Vec<Cap> = all_caps
            .into_iter()
            .filter(|cap| {
                self.allow_list
                    .as_ref()
                    .is_none_or(|allowed| allowed.contains(&cap.urn))
            })
            .collect();
        catalog.register("planner", filtered);
        Ok(MediaGraph::from_catalog(&catalog))
    }

    /// The shortest cap-urn path from `source` to `target`, after
    /// allow-list filtering.
    ///
    /// # Errors
    ///
    /// [`PlannerError::NotFound`] if no path exists.
    pub async fn find_path(&self, source: &MediaUrn, target: &MediaUrn) -> Result<Vec<CapUrn>, PlannerError> {
        let graph = self.graph().await?;
        graph
            .find_path(&source.to_string(), &target.to_string())
            .map(|edges| edges.into_iter().map(|e| e.cap_urn).collect())
            .ok_or_else(|| PlannerError::NotFound(format!("no path from {source} to {target}")))
    }

    /// All simple paths from `source` to `target`, up to
    /// [`DEFAULT_MAX_DEPTH`] steps.
    pub async fn find_all_paths(&self, source: &MediaUrn, target: &MediaUrn) -> Result<Vec<Vec<Edge>>, PlannerError> {
        let graph = self.graph().await?;
        Ok(graph.find_all_paths(&source.to_string(), &target.to_string(), DEFAULT_MAX_DEPTH))
    }

    /// Every media type reachable from `source`.
    pub async fn get_reachable_targets(&self, source: &MediaUrn) -> Result<Vec<MediaUrn>, PlannerError> {
        let graph = self.graph().await?;
        let source_text = source.to_string();
        let mut reachable = Vec::new();
        for node in graph.nodes() {
            if node != source_text && graph.can_convert(&source_text, node) {
                reachable.push(MediaUrn::parse(node).map_err(|err| PlannerError::Internal(err.to_string()))?);
            }
        }
        Ok(reachable)
    }

    /// [`Self::get_reachable_targets`], each paired with its resolved
    /// [`MediaSpec`].
    pub async fn get_reachable_targets_with_metadata(
        &self,
        source: &MediaUrn,
    ) -> Result<Vec<(MediaUrn, MediaSpec)>, PlannerError> {
        let targets = self.get_reachable_targets(source).await?;
        let mut out = Vec::with_capacity(targets.len());
        for target in targets {
            let spec = self.media.resolve(&target).await?;
            out.push((target, spec));
        }
        Ok(out)
    }

    /// Cardinality analysis of the best path from `source` to `target`.
    pub async fn analyze_path_cardinality(
        &self,
        source: &MediaUrn,
        target: &MediaUrn,
    ) -> Result<capns_cardinality::PathCardinality, PlannerError> {
        let path = self.best_path(source, target).await?;
        Ok(analyze_path_cardinality(&path))
    }

    /// The declared arguments of each cap along the best path from
    /// `source` to `target`.
    pub async fn analyze_path_arguments(
        &self,
        source: &MediaUrn,
        target: &MediaUrn,
    ) -> Result<Vec<(CapUrn, Vec<capns_catalog::Arg>)>, PlannerError> {
        let path = self.best_path(source, target).await?;
        let mut out = Vec::with_capacity(path.len());
        for edge in path {
            let matches = self.caps.lookup(&edge.cap_urn).await?;
            let cap = matches
                .into_iter()
                .find(|cap| cap.urn == edge.cap_urn)
                .ok_or_else(|| PlannerError::NotFound(format!("cap {} not in registry", edge.cap_urn)))?;
            out.push((cap.urn, cap.args));
        }
        Ok(out)
    }

    async fn best_path(&self, source: &MediaUrn, target: &MediaUrn) -> Result<Vec<Edge>, PlannerError> {
        let graph = self.graph().await?;
        graph
            .find_best_path(&source.to_string(), &target.to_string(), DEFAULT_MAX_DEPTH)
            .ok_or_else(|| PlannerError::NotFound(format!("no path from {source} to {target}")))
    }

    /// Build a full [`Plan`] converting `source` to `target`, binding the
    /// first step's input to `input_files` and chaining subsequent steps
    /// to each prior step's output. Unresolved required arguments become
    /// [`ArgumentBinding::Slot`]s.
    ///
    /// # Errors
    ///
    /// [`PlannerError::NotFound`] if no path exists, or
    /// [`PlannerError::Internal`] if a step's cap vanished from the
    /// registry between path-finding and binding.
    pub async fn build_plan(
        &self,
        source: &MediaUrn,
        target: &MediaUrn,
        input_file_count: usize,
    ) -> Result<Plan, PlannerError> {
        let path = self.best_path(source, target).await?;
        let pattern_analysis = analyze_path_cardinality(&path);

        let mut steps = Vec::with_capacity(path.len());
        for (index, edge) in path.iter().enumerate() {
            let matches = self.caps.lookup(&edge.cap_urn).await?;
            let cap = matches
                .into_iter()
                .find(|cap| cap.urn == edge.cap_urn)
                .ok_or_else(|| PlannerError::Internal(format!("cap {} vanished from registry", edge.cap_urn)))?;

            let node_id = format!("step-{index}");
            let mut bindings = std::collections::HashMap::new();
            for (arg_index, arg) in cap.args.iter().enumerate() {
                let key = arg_key(arg, arg_index);
                let binding = if index == 0 {
                    if input_file_count > 0 {
                        ArgumentBinding::InputFileAtIndex(0)
                    } else if let Some(default) = &arg.default {
                        ArgumentBinding::LiteralJson(default.clone())
                    } else if arg.required {
                        ArgumentBinding::Slot {
                            name: key.clone(),
                            schema: None,
                        }
                    } else {
                        ArgumentBinding::CapDefault
                    }
                } else {
                    let previous: &PlanStep = &steps[index - 1];
                    ArgumentBinding::PreviousOutput {
                        node_id: previous.node_id.clone(),
                        field: None,
                    }
                };
                bindings.insert(key, binding);
            }

            steps.push(PlanStep {
                node_id,
                cap_urn: cap.urn,
                registry_name: edge.registry_name.clone(),
                bindings,
            });
        }

        Ok(Plan {
            steps,
            pattern: pattern_analysis.pattern,
            fan_out_points: pattern_analysis.fan_out_points,
        })
    }
}

fn arg_key(arg: &capns_catalog::Arg, index: usize) -> String {
    if arg.media_urn.to_string() == "media:" {
        index.to_string()
    } else {
        arg.media_urn.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CatalogCapRegistry, MediaSpecTableRegistry};
    use capns_catalog::Arg;
    use std::sync::Arc;

    fn cap_with_arg(urn: &str) -> Cap {
        Cap {
            urn: CapUrn::parse(urn).unwrap(),
            title: urn.to_owned(),
            description: None,
            command: "c".into(),
            args: vec![Arg {
                media_urn: MediaUrn::parse("media:").unwrap(),
                required: true,
                sources: vec![],
                description: None,
                default: None,
                metadata: None,
            }],
            output: None,
            media_specs: vec![],
        }
    }

    fn planner() -> PlanBuilder<CatalogCapRegistry, MediaSpecTableRegistry> {
        let mut catalog = CapCatalog::new();
        catalog.register(
            "plugin-a",
            vec![
                cap_with_arg("cap:in=media:pdf;out=media:json;op=split-pages"),
                cap_with_arg("cap:in=media:json;out=\"media:image;png\";op=render"),
            ],
        );
        PlanBuilder::new(
            CatalogCapRegistry::new(Arc::new(catalog)),
            MediaSpecTableRegistry::default(),
        )
    }

    #[tokio::test]
    async fn find_path_returns_cap_sequence() {
        let planner = planner();
        let path = planner
            .find_path(&MediaUrn::parse("media:pdf").unwrap(), &MediaUrn::parse("media:image;png").unwrap())
            .await
            .unwrap();
        assert_eq!(path.len(), 2);
    }

    #[tokio::test]
    async fn build_plan_binds_first_step_to_input_and_chains_rest() {
        let planner = planner();
        let plan = planner
            .build_plan(
                &MediaUrn::parse("media:pdf").unwrap(),
                &MediaUrn::parse("media:image;png").unwrap(),
                1,
            )
            .await
            .unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert!(plan.is_fully_bound());
        let first_binding = plan.steps[0].bindings.values().next().unwrap();
        assert!(matches!(first_binding, ArgumentBinding::InputFileAtIndex(0)));
        let second_binding = plan.steps[1].bindings.values().next().unwrap();
        assert!(matches!(second_binding, ArgumentBinding::PreviousOutput { .. }));
        assert_eq!(plan.fan_out_points, Vec::<usize>::new());
    }

    #[tokio::test]
    async fn build_plan_without_input_files_leaves_a_slot() {
        let planner = planner();
        let plan = planner
            .build_plan(
                &MediaUrn::parse("media:pdf").unwrap(),
                &MediaUrn::parse("media:image;png").unwrap(),
                0,
            )
            .await
            .unwrap();
        assert!(!plan.is_fully_bound());
        assert_eq!(plan.open_slots().len(), 1);
    }

    #[tokio::test]
    async fn allow_list_excludes_disallowed_caps() {
        let mut catalog = CapCatalog::new();
        catalog.register(
            "plugin-a",
            vec![cap_with_arg("cap:in=media:pdf;out=\"media:image;png\";op=direct")],
        );
        let allow_list = vec![CapUrn::parse("cap:in=media:pdf;out=\"media:image;png\";op=other").unwrap()];
        let planner = PlanBuilder::with_allow_list(
            CatalogCapRegistry::new(Arc::new(catalog)),
            MediaSpecTableRegistry::default(),
            allow_list,
        );
        let err = planner
            .find_path(&MediaUrn::parse("media:pdf").unwrap(), &MediaUrn::parse("media:image;png").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::NotFound(_)));
    }
}

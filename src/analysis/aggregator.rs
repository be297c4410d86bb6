use crate::analysis::summary::Summary;
use crate::analysis::{Diagnostic, Level};
use crate::history::Window;
use crate::record::{slug, Measurement, Outcome, ProjectRun};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Identity-keyed summaries for all four levels of one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryTree {
    pub project: String,
    /// Build numbers in the window the tree was built from.
    #[serde(default)]
    pub builds: Vec<u32>,
    /// Exactly one entry, keyed by project name, unless the history is empty.
    pub projects: BTreeMap<String, Summary>,
    pub features: BTreeMap<String, Summary>,
    pub scenarios: BTreeMap<String, Summary>,
    pub steps: BTreeMap<String, Summary>,
}

impl SummaryTree {
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            ..Self::default()
        }
    }

    /// The project-level summary.
    pub fn overall(&self) -> Option<&Summary> {
        self.projects.get(&self.project)
    }

    pub fn level(&self, level: Level) -> &BTreeMap<String, Summary> {
        match level {
            Level::Project => &self.projects,
            Level::Feature => &self.features,
            Level::Scenario => &self.scenarios,
            Level::Step => &self.steps,
        }
    }

    fn level_mut(&mut self, level: Level) -> &mut BTreeMap<String, Summary> {
        match level {
            Level::Project => &mut self.projects,
            Level::Feature => &mut self.features,
            Level::Scenario => &mut self.scenarios,
            Level::Step => &mut self.steps,
        }
    }

    pub fn get(&self, level: Level, id: &str) -> Option<&Summary> {
        self.level(level).get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
            && self.features.is_empty()
            && self.scenarios.is_empty()
            && self.steps.is_empty()
    }
}

/// Output of one fold over a window.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub tree: SummaryTree,
    pub diagnostics: Vec<Diagnostic>,
}

/// Owning fold state for one aggregation pass.
///
/// Each pass builds its own aggregator, so passes for different projects
/// share nothing.
pub struct Aggregator {
    tree: SummaryTree,
    diagnostics: Vec<Diagnostic>,
    children: HashMap<(Level, String), BTreeSet<String>>,
}

/// Hands out unique identities within one build and level. A taken id gets
/// the first free `-2`, `-3`, ... suffix, so a build contributes at most one
/// entry per identity.
#[derive(Default)]
struct IdentityClaims {
    taken: HashSet<String>,
}

impl IdentityClaims {
    fn claim(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2u32;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// One claim set per level; ids of different levels never collide.
#[derive(Default)]
struct BuildClaims {
    features: IdentityClaims,
    scenarios: IdentityClaims,
    steps: IdentityClaims,
}

/// Identity and parent of a node being recorded.
struct Node<'a> {
    level: Level,
    id: &'a str,
    name: &'a str,
    senior: Option<(&'a str, &'a str)>,
}

impl Aggregator {
    pub fn new(project: &str) -> Self {
        Self {
            tree: SummaryTree::new(project),
            diagnostics: Vec::new(),
            children: HashMap::new(),
        }
    }

    /// Fold one build. Runs must arrive in ascending build order.
    pub fn fold_run(&mut self, run: &ProjectRun) {
        let build = run.build_number;
        let project = self.tree.project.clone();
        let mut claims = BuildClaims::default();
        let mut feature_measures = Vec::with_capacity(run.features.len());
        let mut project_steps = Vec::new();

        for feature in &run.features {
            let feature_id = claims.features.claim(&feature.id);
            let mut scenario_measures = Vec::with_capacity(feature.elements.len());
            let mut feature_steps = Vec::new();

            for scenario in &feature.elements {
                let scenario_id = claims.scenarios.claim(&scenario.id);
                let mut step_measures = Vec::with_capacity(scenario.steps.len());

                for step in &scenario.steps {
                    let step_id = claims.steps.claim(&format!("{};{}", scenario_id, slug(&step.text())));
                    let measured = match step.result.measure() {
                        Ok(m) => m,
                        Err(e) => {
                            warn!(project = %project, build, id = %step_id, error = %e, "malformed step result");
                            self.diagnostics.push(Diagnostic::MalformedEntry {
                                build,
                                id: step_id.clone(),
                                reason: e.to_string(),
                            });
                            Measurement::SKIPPED
                        }
                    };

                    let summary = self.record(
                        Node {
                            level: Level::Step,
                            id: &step_id,
                            name: &step.name,
                            senior: Some((scenario_id.as_str(), scenario.name.as_str())),
                        },
                        build,
                        measured,
                        &[measured.outcome],
                    );
                    summary.keyword = Some(step.keyword.trim().to_string());
                    if step.rows.is_some() {
                        summary.rows = step.rows.clone();
                    }
                    step_measures.push(measured);
                }

                let step_outcomes: Vec<Outcome> = step_measures.iter().map(|m| m.outcome).collect();
                let measured = Measurement::combine(&step_measures);
                self.record(
                    Node {
                        level: Level::Scenario,
                        id: &scenario_id,
                        name: &scenario.name,
                        senior: Some((feature_id.as_str(), feature.name.as_str())),
                    },
                    build,
                    measured,
                    &step_outcomes,
                );
                scenario_measures.push(measured);
                feature_steps.extend(step_outcomes);
            }

            let measured = Measurement::combine(&scenario_measures);
            self.record(
                Node {
                    level: Level::Feature,
                    id: &feature_id,
                    name: &feature.name,
                    senior: Some((project.as_str(), project.as_str())),
                },
                build,
                measured,
                &feature_steps,
            );
            feature_measures.push(measured);
            project_steps.extend(feature_steps);
        }

        let measured = Measurement::combine(&feature_measures);
        self.record(
            Node {
                level: Level::Project,
                id: &project,
                name: &project,
                senior: None,
            },
            build,
            measured,
            &project_steps,
        );
        self.tree.builds.push(build);

        debug!(
            project = %project,
            build,
            elapsed_ns = measured.elapsed,
            outcome = %measured.outcome,
            "folded build"
        );
    }

    pub fn note_missing(&mut self, build: u32) {
        self.diagnostics.push(Diagnostic::MissingHistory { build });
    }

    fn record(
        &mut self,
        node: Node<'_>,
        build: u32,
        measured: Measurement,
        step_outcomes: &[Outcome],
    ) -> &mut Summary {
        if let (Some(parent), Some((senior_id, _))) = (node.level.parent(), node.senior) {
            self.children
                .entry((parent, senior_id.to_string()))
                .or_default()
                .insert(node.id.to_string());
        }

        let summary = self
            .tree
            .level_mut(node.level)
            .entry(node.id.to_string())
            .or_insert_with(|| {
                let summary = Summary::new(node.id, node.name, node.level);
                match node.senior {
                    Some((senior_id, senior_name)) => summary.with_senior(senior_id, senior_name),
                    None => summary,
                }
            });

        // Display names follow the most recent build.
        if summary.name != node.name {
            summary.name = node.name.to_string();
        }
        if let Some((_, senior_name)) = node.senior {
            if summary.senior_name.as_deref() != Some(senior_name) {
                summary.senior_name = Some(senior_name.to_string());
            }
        }
        summary.record(build, measured);
        for &outcome in step_outcomes {
            summary.add_step_outcome(outcome);
        }
        summary
    }

    pub fn finish(mut self) -> Aggregation {
        for level in [Level::Project, Level::Feature, Level::Scenario] {
            for (id, summary) in self.tree.level_mut(level).iter_mut() {
                summary.number_of_sub_items = self
                    .children
                    .get(&(level, id.clone()))
                    .map_or(0, |c| c.len() as u32);
            }
        }

        info!(
            project = %self.tree.project,
            builds = self.tree.builds.len(),
            features = self.tree.features.len(),
            scenarios = self.tree.scenarios.len(),
            steps = self.tree.steps.len(),
            diagnostics = self.diagnostics.len(),
            "aggregation complete"
        );

        Aggregation {
            tree: self.tree,
            diagnostics: self.diagnostics,
        }
    }
}

/// Fold a whole window into a fresh summary tree.
pub fn aggregate(window: &Window) -> Aggregation {
    let mut aggregator = Aggregator::new(&window.project);
    for &build in &window.missing {
        aggregator.note_missing(build);
    }
    for run in &window.runs {
        aggregator.fold_run(run);
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Feature, Scenario, Step, StepResult};
    use chrono::Utc;
    use serde_json::json;

    const SEC: u64 = 1_000_000_000;

    fn login_run(build: u32, first: StepResult, second: StepResult) -> ProjectRun {
        ProjectRun::new(
            build,
            Utc::now(),
            vec![Feature::new(
                "login",
                "Login",
                vec![Scenario::new(
                    "login;ok",
                    "Login works",
                    vec![
                        Step::new("Given ", "a user", first),
                        Step::new("Then ", "I am in", second),
                    ],
                )],
            )],
        )
    }

    fn window(runs: Vec<ProjectRun>) -> Window {
        Window {
            project: "shop".to_string(),
            runs,
            missing: Vec::new(),
        }
    }

    #[test]
    fn test_empty_window_gives_empty_maps() {
        let agg = aggregate(&window(Vec::new()));
        assert!(agg.tree.is_empty());
        assert!(agg.tree.overall().is_none());
        assert!(agg.diagnostics.is_empty());
    }

    #[test]
    fn test_levels_roll_up() {
        let agg = aggregate(&window(vec![
            login_run(1, StepResult::passed(SEC), StepResult::passed(2 * SEC)),
            login_run(2, StepResult::passed(SEC), StepResult::failed(4 * SEC)),
        ]));
        let tree = &agg.tree;

        assert_eq!(tree.projects.len(), 1);
        assert_eq!(tree.features.len(), 1);
        assert_eq!(tree.scenarios.len(), 1);
        assert_eq!(tree.steps.len(), 2);

        let scenario = tree.get(Level::Scenario, "login;ok").unwrap();
        assert_eq!(scenario.entries()[0].elapsed, 3 * SEC);
        assert_eq!(scenario.entries()[1].elapsed, 5 * SEC);
        assert_eq!(scenario.passed_builds(), 1);
        assert_eq!(scenario.failed_builds(), 1);
        assert_eq!(scenario.passed_steps(), 3);
        assert_eq!(scenario.failed_steps(), 1);
        assert_eq!(scenario.senior_id.as_deref(), Some("login"));
        assert_eq!(scenario.number_of_sub_items, 2);

        let overall = tree.overall().unwrap();
        assert_eq!(overall.total_builds(), 2);
        assert_eq!(overall.passed_steps(), 3);
        assert_eq!(overall.failed_steps(), 1);
        assert_eq!(overall.senior_id, None);
        assert_eq!(overall.number_of_sub_items, 1);

        let step = tree.get(Level::Step, "login;ok;then-i-am-in").unwrap();
        assert_eq!(step.keyword.as_deref(), Some("Then"));
        assert_eq!(step.senior_id.as_deref(), Some("login;ok"));
        assert_eq!(step.longest_duration(), 2 * SEC);
    }

    #[test]
    fn test_malformed_step_is_skipped_and_reported() {
        let bad = StepResult {
            status: "passed".to_string(),
            duration: Some(json!("forever")),
            error_message: None,
        };
        let agg = aggregate(&window(vec![login_run(7, bad, StepResult::passed(SEC))]));

        assert_eq!(agg.diagnostics.len(), 1);
        assert!(matches!(
            &agg.diagnostics[0],
            Diagnostic::MalformedEntry { build: 7, id, .. } if id == "login;ok;given-a-user"
        ));

        let step = agg.tree.get(Level::Step, "login;ok;given-a-user").unwrap();
        assert_eq!(step.skipped_steps(), 1);
        assert_eq!(step.total_builds(), 0);

        let scenario = agg.tree.get(Level::Scenario, "login;ok").unwrap();
        assert_eq!(scenario.entries()[0].outcome, Outcome::Skipped);
        assert_eq!(scenario.average_duration(), 0);
    }

    #[test]
    fn test_discontinued_identity_keeps_history() {
        let mut later = login_run(2, StepResult::passed(SEC), StepResult::passed(SEC));
        later.features[0].elements[0].id = "login;renamed".to_string();

        let agg = aggregate(&window(vec![
            login_run(1, StepResult::passed(SEC), StepResult::passed(SEC)),
            later,
        ]));

        let old = agg.tree.get(Level::Scenario, "login;ok").unwrap();
        let new = agg.tree.get(Level::Scenario, "login;renamed").unwrap();
        assert_eq!(old.reported_builds(), 1);
        assert_eq!(new.reported_builds(), 1);
        assert_eq!(agg.tree.get(Level::Feature, "login").unwrap().number_of_sub_items, 2);
    }

    #[test]
    fn test_repeated_step_text_gets_distinct_ids() {
        let mut run = login_run(1, StepResult::passed(SEC), StepResult::passed(SEC));
        run.features[0].elements[0].steps[1] = Step::new("Given ", "a user", StepResult::passed(3 * SEC));

        let agg = aggregate(&window(vec![run]));
        assert!(agg.tree.steps.contains_key("login;ok;given-a-user"));
        let second = agg.tree.get(Level::Step, "login;ok;given-a-user-2").unwrap();
        assert_eq!(second.average_duration(), 3 * SEC);
        assert_eq!(second.reported_builds(), 1);
    }

    #[test]
    fn test_suffix_never_reuses_a_real_id() {
        let mut run = login_run(1, StepResult::passed(SEC), StepResult::passed(2 * SEC));
        run.features[0].elements[0].steps = vec![
            Step::new("Given ", "a user", StepResult::passed(SEC)),
            Step::new("Given ", "a user", StepResult::passed(2 * SEC)),
            Step::new("Given ", "a user 2", StepResult::passed(3 * SEC)),
        ];

        let agg = aggregate(&window(vec![run]));
        let ids: Vec<&str> = agg.tree.steps.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            ids,
            vec!["login;ok;given-a-user", "login;ok;given-a-user-2", "login;ok;given-a-user-2-2"]
        );
        for step in agg.tree.steps.values() {
            assert_eq!(step.entries().len(), 1, "{}", step.id);
        }
        assert_eq!(agg.tree.get(Level::Step, "login;ok;given-a-user-2").unwrap().average_duration(), 2 * SEC);
        assert_eq!(agg.tree.get(Level::Step, "login;ok;given-a-user-2-2").unwrap().average_duration(), 3 * SEC);
    }

    #[test]
    fn test_levels_claim_ids_separately() {
        let mut run = login_run(1, StepResult::passed(SEC), StepResult::passed(SEC));
        // A scenario sharing its feature's id is still a distinct identity.
        run.features[0].elements[0].id = "login".to_string();

        let agg = aggregate(&window(vec![run]));
        assert!(agg.tree.features.contains_key("login"));
        assert!(agg.tree.scenarios.contains_key("login"));
        assert!(agg.tree.steps.contains_key("login;given-a-user"));
    }

    #[test]
    fn test_renamed_parent_updates_senior_name() {
        let mut later = login_run(2, StepResult::passed(SEC), StepResult::passed(SEC));
        later.features[0].name = "Sign in".to_string();
        later.features[0].elements[0].name = "Sign in works".to_string();

        let agg = aggregate(&window(vec![
            login_run(1, StepResult::passed(SEC), StepResult::passed(SEC)),
            later,
        ]));

        let scenario = agg.tree.get(Level::Scenario, "login;ok").unwrap();
        assert_eq!(scenario.name, "Sign in works");
        assert_eq!(scenario.senior_name.as_deref(), Some("Sign in"));
        let step = agg.tree.get(Level::Step, "login;ok;given-a-user").unwrap();
        assert_eq!(step.senior_name.as_deref(), Some("Sign in works"));
    }

    #[test]
    fn test_every_senior_resolves_one_level_up() {
        let agg = aggregate(&window(vec![
            login_run(1, StepResult::passed(SEC), StepResult::skipped()),
            login_run(3, StepResult::failed(SEC), StepResult::skipped()),
        ]));
        let tree = &agg.tree;

        for level in [Level::Feature, Level::Scenario, Level::Step] {
            for summary in tree.level(level).values() {
                let parent = level.parent().unwrap();
                let senior = summary.senior_id.as_deref().unwrap();
                assert!(tree.get(parent, senior).is_some(), "{} has no parent", summary.id);
            }
        }
        for summary in tree.steps.values().chain(tree.scenarios.values()) {
            assert_eq!(summary.total_builds(), summary.passed_builds() + summary.failed_builds());
            assert!(summary.reported_builds() as usize <= tree.builds.len());
        }
    }

    #[test]
    fn test_missing_builds_become_diagnostics() {
        let mut w = window(vec![login_run(2, StepResult::passed(SEC), StepResult::passed(SEC))]);
        w.missing = vec![1];
        let agg = aggregate(&w);
        assert_eq!(agg.diagnostics, vec![Diagnostic::MissingHistory { build: 1 }]);
        assert_eq!(agg.tree.builds, vec![2]);
    }
}

//! Render-time decoration of persisted summaries.
//!
//! Views add project context, navigation links and child lists on top of a
//! [`Summary`] read back from the store. They borrow the summary, never
//! modify it and are never written anywhere.

use super::aggregator::SummaryTree;
use super::ranking::{children_of, display_count, rank};
use super::summary::{page_link, Summary};
use super::Level;
use std::collections::HashMap;

/// URL segment the reports are served under.
pub const DEFAULT_URL_NAME: &str = "cucumber-perf-reports";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub display_name: String,
    pub url_name: String,
}

impl ProjectContext {
    pub fn new(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            url_name: DEFAULT_URL_NAME.to_string(),
        }
    }
}

/// One summary prepared for display.
#[derive(Debug)]
pub struct RenderView<'a> {
    pub summary: &'a Summary,
    pub context: &'a ProjectContext,
    pub page_link: String,
    /// Ranked children, empty for steps.
    pub sub_summaries: Vec<Summary>,
}

impl RenderView<'_> {
    /// Link to this summary's page, relative to the project root.
    pub fn href(&self) -> String {
        format!("{}/{}/{}", self.context.url_name, self.summary.level, self.page_link)
    }
}

/// A reloaded summary tree plus what the view layer needs to navigate it.
#[derive(Debug)]
pub struct ProjectSummary {
    tree: SummaryTree,
    context: ProjectContext,
    display_count: usize,
    links: HashMap<String, (Level, String)>,
}

impl ProjectSummary {
    pub fn new(tree: SummaryTree, context: ProjectContext, requested_count: i64) -> Self {
        let mut links = HashMap::new();
        for level in [Level::Project, Level::Feature, Level::Scenario, Level::Step] {
            for id in tree.level(level).keys() {
                links.insert(page_link(level, id), (level, id.clone()));
            }
        }
        Self {
            tree,
            context,
            display_count: display_count(requested_count),
            links,
        }
    }

    pub fn tree(&self) -> &SummaryTree {
        &self.tree
    }

    pub fn context(&self) -> &ProjectContext {
        &self.context
    }

    pub fn display_count(&self) -> usize {
        self.display_count
    }

    /// Project summary with every feature as a child.
    pub fn overall(&self) -> Option<RenderView<'_>> {
        let summary = self.tree.overall()?;
        Some(self.view(summary))
    }

    pub fn feature(&self, link: &str) -> Option<RenderView<'_>> {
        self.lookup(Level::Feature, link)
    }

    pub fn scenario(&self, link: &str) -> Option<RenderView<'_>> {
        self.lookup(Level::Scenario, link)
    }

    pub fn step(&self, link: &str) -> Option<RenderView<'_>> {
        self.lookup(Level::Step, link)
    }

    /// The slowest summaries of a level, cut to the display count.
    pub fn top(&self, level: Level) -> Vec<Summary> {
        rank(self.tree.level(level).values(), self.display_count)
    }

    pub fn top_features(&self) -> Vec<Summary> {
        self.top(Level::Feature)
    }

    pub fn top_scenarios(&self) -> Vec<Summary> {
        self.top(Level::Scenario)
    }

    pub fn top_steps(&self) -> Vec<Summary> {
        self.top(Level::Step)
    }

    fn lookup(&self, level: Level, link: &str) -> Option<RenderView<'_>> {
        let (found_level, id) = self.links.get(link)?;
        if *found_level != level {
            return None;
        }
        let summary = self.tree.get(level, id)?;
        Some(self.view(summary))
    }

    fn view<'a>(&'a self, summary: &'a Summary) -> RenderView<'a> {
        let sub_summaries = match summary.level.child() {
            Some(child) => children_of(self.tree.level(child).values(), &summary.id),
            None => Vec::new(),
        };
        RenderView {
            summary,
            context: &self.context,
            page_link: summary.page_link(),
            sub_summaries,
        }
    }
}

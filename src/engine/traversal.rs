//! Respondent traversal state and server-side replay

use super::graph::FormGraph;
use super::navigation::NextPage;
use crate::models::AnswerMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Navigation loops back to page {page_index} with unchanged answers")]
    Cycle { page_index: usize },
}

/// One respondent's walk through a form.
///
/// Going back pops the visited-page history; it never re-runs rule evaluation.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    current: usize,
    history: Vec<usize>,
    answers: AnswerMap,
    finished: bool,
}

impl Traversal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn history(&self) -> &[usize] {
        &self.history
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Merge answers entered on the current page
    pub fn record_answers(&mut self, answers: AnswerMap) {
        self.answers.extend(answers);
    }

    /// Leave the current page for the resolved next one
    pub fn advance(&mut self, graph: &FormGraph) -> NextPage {
        if self.finished {
            return NextPage::Terminal;
        }

        let next = graph.resolve_next_page(self.current, &self.answers);
        match next {
            NextPage::Page(index) => {
                self.history.push(self.current);
                self.current = index;
            }
            NextPage::Terminal => self.finished = true,
        }
        next
    }

    /// Return to the previously visited page, if any
    pub fn back(&mut self) -> Option<usize> {
        let previous = self.history.pop()?;
        self.current = previous;
        self.finished = false;
        Some(previous)
    }
}

/// Walk a complete answer map from the first page to the end and return the
/// visited page indices in order. An empty form visits nothing.
pub fn replay(graph: &FormGraph, answers: &AnswerMap) -> Result<Vec<usize>, ReplayError> {
    if graph.is_empty() {
        return Ok(Vec::new());
    }

    let mut visited = vec![0];
    let mut current = 0;

    loop {
        match graph.resolve_next_page(current, answers) {
            NextPage::Terminal => return Ok(visited),
            NextPage::Page(next) => {
                if visited.contains(&next) {
                    return Err(ReplayError::Cycle { page_index: next });
                }
                visited.push(next);
                current = next;
            }
        }
    }
}

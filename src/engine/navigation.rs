//! Page navigation resolver
//!
//! Resolution order for a completed page:
//! 1. no conditional logic: linear progression
//! 2. first matching rule with a resolvable target
//! 3. the default target (absent default ends the form)
//! 4. linear progression as the last resort

use super::condition::evaluate_condition;
use super::graph::{offset_index, CompiledLogic, DefaultTarget, FormGraph, RuleTarget};
use crate::models::AnswerMap;
use serde::Serialize;

/// Outcome of resolving a completed page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextPage {
    /// Show the page at this index of the page sequence
    Page(usize),
    /// No further page: submit the form
    Terminal,
}

impl FormGraph {
    /// Resolve the page that follows `current_index`
    pub fn resolve_next_page(&self, current_index: usize, answers: &AnswerMap) -> NextPage {
        match self.node(current_index) {
            Some(node) => {
                resolve_next_page(current_index, node.logic.as_ref(), self.len(), answers)
            }
            None => {
                tracing::debug!(current_index, page_count = self.len(), "Index outside form, terminating");
                NextPage::Terminal
            }
        }
    }
}

/// Resolve the page after `current_index` in a form of `page_count` pages
pub fn resolve_next_page(
    current_index: usize,
    logic: Option<&CompiledLogic>,
    page_count: usize,
    answers: &AnswerMap,
) -> NextPage {
    let Some(logic) = logic else {
        return linear(current_index, page_count);
    };

    for (position, rule) in logic.rules.iter().enumerate() {
        if !evaluate_condition(&rule.condition, answers) {
            continue;
        }
        match rule.target {
            RuleTarget::Offset(offset) => {
                tracing::debug!(current_index, rule = position, offset, "Navigation rule matched");
                return offset_target(current_index, offset, page_count);
            }
            RuleTarget::Unresolved => {
                tracing::debug!(current_index, rule = position, "Matched rule has no resolvable target");
            }
        }
    }

    match logic.default {
        DefaultTarget::Terminal => return NextPage::Terminal,
        DefaultTarget::Offset(offset) => return offset_target(current_index, offset, page_count),
        DefaultTarget::Unresolved => {
            tracing::debug!(current_index, "Default target unresolved, falling back to linear");
        }
    }

    linear(current_index, page_count)
}

fn offset_target(current_index: usize, offset: i64, page_count: usize) -> NextPage {
    match offset_index(current_index, offset, page_count) {
        Some(index) => NextPage::Page(index),
        None => {
            tracing::debug!(current_index, offset, "Offset leaves the form, terminating");
            NextPage::Terminal
        }
    }
}

fn linear(current_index: usize, page_count: usize) -> NextPage {
    if current_index + 1 < page_count {
        NextPage::Page(current_index + 1)
    } else {
        NextPage::Terminal
    }
}

//! Load-time compilation of page navigation rules
//!
//! Page rules arrive with two addressing schemes: offsets relative to the page and
//! absolute page ids. Compilation folds both into offsets so the resolver deals with
//! a single mode. An id that names no page of the form compiles to `Unresolved`.

use crate::models::{Condition, ConditionalLogic, Page};

/// Compiled destination of a navigation rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    Offset(i64),
    /// Stale id: the rule is treated as a non-match
    Unresolved,
}

/// Compiled fallback of a page's conditional logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultTarget {
    /// No default configured: the page ends the form
    Terminal,
    Offset(i64),
    /// Stale id: resolution continues with linear progression
    Unresolved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub condition: Condition,
    pub target: RuleTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledLogic {
    pub rules: Vec<CompiledRule>,
    pub default: DefaultTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageNode {
    pub page_id: i64,
    pub logic: Option<CompiledLogic>,
}

/// Navigation view of a form: one node per page, in traversal order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormGraph {
    nodes: Vec<PageNode>,
}

impl FormGraph {
    /// Compile pages that are already sorted by `sort_order`
    pub fn from_pages(pages: &[Page]) -> Self {
        let ids: Vec<i64> = pages.iter().map(|p| p.id).collect();
        Self::compile(
            pages
                .iter()
                .map(|p| (p.id, p.conditional_logic.as_ref())),
            &ids,
        )
    }

    /// Compile `(page id, logic)` pairs in traversal order
    pub fn compile<'a>(
        pages: impl IntoIterator<Item = (i64, Option<&'a ConditionalLogic>)>,
        page_ids: &[i64],
    ) -> Self {
        let nodes = pages
            .into_iter()
            .enumerate()
            .map(|(index, (page_id, logic))| PageNode {
                page_id,
                logic: logic.map(|logic| compile_logic(logic, index, page_ids)),
            })
            .collect();

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> Option<&PageNode> {
        self.nodes.get(index)
    }

    /// Every index a page can transition to, ascending
    pub fn successors(&self, index: usize) -> Vec<usize> {
        let Some(node) = self.nodes.get(index) else {
            return Vec::new();
        };
        let count = self.nodes.len();
        let linear = (index + 1 < count).then_some(index + 1);

        let Some(logic) = &node.logic else {
            return linear.into_iter().collect();
        };

        let mut targets: Vec<usize> = logic
            .rules
            .iter()
            .filter_map(|rule| match rule.target {
                RuleTarget::Offset(offset) => offset_index(index, offset, count),
                RuleTarget::Unresolved => None,
            })
            .collect();

        match logic.default {
            DefaultTarget::Terminal => {}
            DefaultTarget::Offset(offset) => targets.extend(offset_index(index, offset, count)),
            DefaultTarget::Unresolved => targets.extend(linear),
        }

        targets.sort_unstable();
        targets.dedup();
        targets
    }

    /// Find a forward navigation cycle, returned as the page indices along it
    pub fn find_cycle(&self) -> Option<Vec<usize>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut path: Vec<usize> = Vec::new();

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // Iterative DFS: (node, successors, next successor position)
            let mut stack: Vec<(usize, Vec<usize>, usize)> = vec![(start, self.successors(start), 0)];
            marks[start] = Mark::OnPath;
            path.push(start);

            while let Some(top) = stack.last_mut() {
                let node = top.0;
                let next = top.1.get(top.2).copied();
                top.2 += 1;

                match next {
                    Some(next) => match marks[next] {
                        Mark::OnPath => {
                            let from = path.iter().position(|&p| p == next).unwrap_or(0);
                            let mut cycle = path[from..].to_vec();
                            cycle.push(next);
                            return Some(cycle);
                        }
                        Mark::Unvisited => {
                            marks[next] = Mark::OnPath;
                            path.push(next);
                            stack.push((next, self.successors(next), 0));
                        }
                        Mark::Done => {}
                    },
                    None => {
                        marks[node] = Mark::Done;
                        path.pop();
                        stack.pop();
                    }
                }
            }
        }

        None
    }
}

fn compile_logic(logic: &ConditionalLogic, index: usize, page_ids: &[i64]) -> CompiledLogic {
    let rules = logic
        .rules
        .iter()
        .map(|rule| {
            let target = match (rule.next_page_offset, rule.next_page_id) {
                (Some(offset), _) => RuleTarget::Offset(offset),
                (None, Some(id)) => match id_offset(id, index, page_ids) {
                    Some(offset) => RuleTarget::Offset(offset),
                    None => RuleTarget::Unresolved,
                },
                (None, None) => RuleTarget::Unresolved,
            };
            CompiledRule {
                condition: rule.condition.clone(),
                target,
            }
        })
        .collect();

    let default = match (logic.default_next_page_offset, logic.default_next_page_id) {
        (Some(offset), _) => DefaultTarget::Offset(offset),
        (None, Some(id)) => match id_offset(id, index, page_ids) {
            Some(offset) => DefaultTarget::Offset(offset),
            None => DefaultTarget::Unresolved,
        },
        (None, None) => DefaultTarget::Terminal,
    };

    CompiledLogic { rules, default }
}

fn id_offset(id: i64, index: usize, page_ids: &[i64]) -> Option<i64> {
    let target = page_ids.iter().position(|&p| p == id)?;
    Some(target as i64 - index as i64)
}

/// Absolute index for `index + offset`, or `None` when it leaves the form
pub(crate) fn offset_index(index: usize, offset: i64, count: usize) -> Option<usize> {
    let target = (index as i64).checked_add(offset)?;
    if target >= 0 && (target as usize) < count {
        Some(target as usize)
    } else {
        None
    }
}

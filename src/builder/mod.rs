//! Form builder draft aggregate
//!
//! Unsaved pages and fields carry temporary ids (zero or negative). Navigation rules
//! may reference temporary page ids; saving assigns persisted ids and rewrites every
//! reference through an [`IdMap`].

use crate::engine::graph::offset_index;
use crate::models::{
    Condition, ConditionalLogic, Field, FieldOption, FieldSettings, FieldType, Form, Page,
    PageSettings,
};
use crate::validation::validate_slug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FormDraft {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom = "slug_rule")]
    pub slug: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub owner_id: Option<i64>,
    #[serde(default)]
    pub pages: Vec<DraftPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPage {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: PageSettings,
    #[serde(default)]
    pub conditional_logic: Option<ConditionalLogic>,
    #[serde(default)]
    pub fields: Vec<DraftField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftField {
    #[serde(default)]
    pub id: i64,
    pub label: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub validation: Vec<String>,
    #[serde(default)]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub settings: FieldSettings,
}

fn default_active() -> bool {
    true
}

fn slug_rule(slug: &str) -> Result<(), validator::ValidationError> {
    validate_slug(slug).map_err(|_| validator::ValidationError::new("slug"))
}

/// Whether an id was assigned locally and never persisted
pub fn is_temporary(id: i64) -> bool {
    id <= 0
}

impl FormDraft {
    /// Start editing a persisted form
    pub fn from_form(form: &Form) -> Self {
        Self {
            name: form.name.clone(),
            slug: form.slug.clone(),
            description: form.description.clone(),
            settings: form.settings.clone(),
            is_active: form.is_active,
            owner_id: form.owner_id,
            pages: form
                .pages
                .iter()
                .map(|page| DraftPage {
                    id: page.id,
                    title: page.title.clone(),
                    description: page.description.clone(),
                    settings: page.settings.clone(),
                    conditional_logic: page.conditional_logic.clone(),
                    fields: page.fields.iter().map(DraftField::from).collect(),
                })
                .collect(),
        }
    }

    /// Next temporary id, below every id already used in the draft
    pub fn next_temp_id(&self) -> i64 {
        let lowest = self
            .pages
            .iter()
            .map(|p| p.id)
            .chain(self.pages.iter().flat_map(|p| p.fields.iter().map(|f| f.id)))
            .min()
            .unwrap_or(0);
        lowest.min(0) - 1
    }

    /// Give every page and field that has no id yet a distinct temporary one
    pub fn assign_temporary_ids(&mut self) {
        for page_index in 0..self.pages.len() {
            if self.pages[page_index].id == 0 {
                let id = self.next_temp_id();
                self.pages[page_index].id = id;
            }
            for field_index in 0..self.pages[page_index].fields.len() {
                if self.pages[page_index].fields[field_index].id == 0 {
                    let id = self.next_temp_id();
                    self.pages[page_index].fields[field_index].id = id;
                }
            }
        }
    }

    /// Append a page and return its temporary id
    pub fn add_page(&mut self, title: impl Into<String>) -> i64 {
        let id = self.next_temp_id();
        self.pages.push(DraftPage {
            id,
            title: title.into(),
            description: None,
            settings: PageSettings::default(),
            conditional_logic: None,
            fields: Vec::new(),
        });
        id
    }

    /// Remove a page with its fields; rules and defaults that targeted it are cleared
    pub fn remove_page(&mut self, page_id: i64) -> Option<DraftPage> {
        let position = self.pages.iter().position(|p| p.id == page_id)?;
        let before = self.page_order();
        let removed = self.pages.remove(position);
        self.rebase_offsets(&before);

        for page in &mut self.pages {
            if let Some(logic) = page.conditional_logic.as_mut() {
                logic.rules.retain(|rule| {
                    rule.next_page_offset.is_some() || rule.next_page_id != Some(page_id)
                });
                if logic.default_next_page_id == Some(page_id) {
                    logic.default_next_page_id = None;
                }
            }
        }

        Some(removed)
    }

    /// Move a page to `index`, clamped to the end of the page list
    pub fn move_page(&mut self, page_id: i64, index: usize) -> bool {
        let Some(position) = self.pages.iter().position(|p| p.id == page_id) else {
            return false;
        };
        let before = self.page_order();
        let page = self.pages.remove(position);
        let index = index.min(self.pages.len());
        self.pages.insert(index, page);
        self.rebase_offsets(&before);
        true
    }

    fn page_order(&self) -> Vec<i64> {
        self.pages.iter().map(|p| p.id).collect()
    }

    /// Keep offset-addressed targets on the same pages after the page list changed.
    ///
    /// `before` is the page id order prior to the change. Rules whose target page is
    /// gone are dropped and such a default is cleared. Offsets that pointed past either
    /// end keep doing so.
    fn rebase_offsets(&mut self, before: &[i64]) {
        let after = self.page_order();

        for (new_index, page) in self.pages.iter_mut().enumerate() {
            let Some(old_index) = before.iter().position(|&id| id == page.id) else {
                continue;
            };
            let Some(logic) = page.conditional_logic.as_mut() else {
                continue;
            };

            let rebase = |offset: i64| -> Option<i64> {
                match offset_index(old_index, offset, before.len()) {
                    Some(target) => after
                        .iter()
                        .position(|&id| id == before[target])
                        .map(|t| t as i64 - new_index as i64),
                    None if offset_index(new_index, offset, after.len()).is_none() => Some(offset),
                    None if offset < 0 => Some(-(new_index as i64) - 1),
                    None => Some((after.len() - new_index) as i64),
                }
            };

            logic.rules.retain_mut(|rule| match rule.next_page_offset {
                Some(offset) => match rebase(offset) {
                    Some(rebased) => {
                        rule.next_page_offset = Some(rebased);
                        true
                    }
                    None => false,
                },
                None => true,
            });
            if let Some(offset) = logic.default_next_page_offset {
                logic.default_next_page_offset = rebase(offset);
            }
        }
    }

    /// Append a field to a page and return its temporary id
    pub fn add_field(&mut self, page_id: i64, mut field: DraftField) -> Option<i64> {
        let id = self.next_temp_id();
        let page = self.pages.iter_mut().find(|p| p.id == page_id)?;
        field.id = id;
        page.fields.push(field);
        Some(id)
    }

    pub fn remove_field(&mut self, field_id: i64) -> Option<DraftField> {
        self.pages.iter_mut().find_map(|page| {
            let position = page.fields.iter().position(|f| f.id == field_id)?;
            Some(page.fields.remove(position))
        })
    }

    /// Persisted pages for `form_id`: ids mapped, sort orders taken from position
    pub fn reconcile(&self, form_id: i64, ids: &IdMap) -> Vec<Page> {
        self.pages
            .iter()
            .enumerate()
            .map(|(page_index, page)| {
                let page_id = ids.page(page.id);
                Page {
                    id: page_id,
                    form_id,
                    title: page.title.clone(),
                    description: page.description.clone(),
                    sort_order: page_index as i32 + 1,
                    settings: page.settings.clone(),
                    conditional_logic: page
                        .conditional_logic
                        .as_ref()
                        .map(|logic| ids.rewrite_logic(logic)),
                    fields: page
                        .fields
                        .iter()
                        .enumerate()
                        .map(|(field_index, field)| {
                            field.to_field(ids.field(field.id), page_id, field_index as i32 + 1)
                        })
                        .collect(),
                }
            })
            .collect()
    }
}

impl DraftField {
    fn to_field(&self, id: i64, page_id: i64, sort_order: i32) -> Field {
        Field {
            id,
            page_id,
            label: self.label.clone(),
            name: self.name.clone(),
            field_type: self.field_type,
            placeholder: self.placeholder.clone(),
            help_text: self.help_text.clone(),
            default_value: self.default_value.clone(),
            required: self.required,
            validation: self.validation.clone(),
            options: self.options.clone(),
            conditions: self.conditions.clone(),
            settings: self.settings.clone(),
            sort_order,
        }
    }
}

impl From<&Field> for DraftField {
    fn from(field: &Field) -> Self {
        Self {
            id: field.id,
            label: field.label.clone(),
            name: field.name.clone(),
            field_type: field.field_type,
            placeholder: field.placeholder.clone(),
            help_text: field.help_text.clone(),
            default_value: field.default_value.clone(),
            required: field.required,
            validation: field.validation.clone(),
            options: field.options.clone(),
            conditions: field.conditions.clone(),
            settings: field.settings.clone(),
        }
    }
}

/// Temporary → persisted id assignments made while saving a draft
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    pages: HashMap<i64, i64>,
    fields: HashMap<i64, i64>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_page(&mut self, draft_id: i64, persisted_id: i64) {
        self.pages.insert(draft_id, persisted_id);
    }

    pub fn insert_field(&mut self, draft_id: i64, persisted_id: i64) {
        self.fields.insert(draft_id, persisted_id);
    }

    pub fn page(&self, draft_id: i64) -> i64 {
        self.pages.get(&draft_id).copied().unwrap_or(draft_id)
    }

    pub fn field(&self, draft_id: i64) -> i64 {
        self.fields.get(&draft_id).copied().unwrap_or(draft_id)
    }

    fn rewrite_logic(&self, logic: &ConditionalLogic) -> ConditionalLogic {
        let mut logic = logic.clone();
        for rule in &mut logic.rules {
            rule.next_page_id = rule.next_page_id.map(|id| self.page(id));
        }
        logic.default_next_page_id = logic.default_next_page_id.map(|id| self.page(id));
        logic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{branching_form, condition};
    use crate::models::{NavigationRule, Operator};
    use serde_json::json;

    fn text_field(name: &str) -> DraftField {
        DraftField {
            id: 0,
            label: name.to_string(),
            name: name.to_string(),
            field_type: FieldType::Text,
            placeholder: None,
            help_text: None,
            default_value: None,
            required: false,
            validation: Vec::new(),
            options: Vec::new(),
            conditions: Vec::new(),
            settings: FieldSettings::default(),
        }
    }

    fn empty_draft() -> FormDraft {
        FormDraft {
            name: "Survey".to_string(),
            slug: "survey".to_string(),
            description: None,
            settings: Map::new(),
            is_active: true,
            owner_id: None,
            pages: Vec::new(),
        }
    }

    #[test]
    fn test_temp_ids_are_negative_and_distinct() {
        let mut draft = empty_draft();
        let first = draft.add_page("One");
        let second = draft.add_page("Two");
        let field = draft.add_field(first, text_field("name")).unwrap();
        assert!(is_temporary(first) && is_temporary(second) && is_temporary(field));
        assert_ne!(first, second);
        assert_ne!(second, field);
    }

    #[test]
    fn test_temp_ids_never_collide_with_persisted() {
        let draft = FormDraft::from_form(&branching_form());
        assert_eq!(draft.next_temp_id(), -1);
    }

    #[test]
    fn test_assign_temporary_ids() {
        let mut draft = empty_draft();
        draft.pages.push(DraftPage {
            id: 0,
            title: "One".to_string(),
            description: None,
            settings: PageSettings::default(),
            conditional_logic: None,
            fields: vec![text_field("a"), text_field("b")],
        });
        draft.assign_temporary_ids();
        let mut ids = vec![draft.pages[0].id];
        ids.extend(draft.pages[0].fields.iter().map(|f| f.id));
        assert!(ids.iter().all(|&id| id < 0));
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_add_field_to_missing_page() {
        let mut draft = empty_draft();
        assert_eq!(draft.add_field(42, text_field("x")), None);
    }

    #[test]
    fn test_remove_page_clears_references() {
        let mut draft = empty_draft();
        let first = draft.add_page("One");
        let second = draft.add_page("Two");
        let third = draft.add_page("Three");
        draft.add_field(second, text_field("x"));
        draft.pages[0].conditional_logic = Some(ConditionalLogic {
            rules: vec![
                NavigationRule {
                    condition: condition("a", Operator::Equals, json!(1)),
                    next_page_offset: None,
                    next_page_id: Some(second),
                },
                NavigationRule {
                    condition: condition("a", Operator::Equals, json!(2)),
                    next_page_offset: Some(1),
                    next_page_id: None,
                },
                NavigationRule {
                    condition: condition("a", Operator::Equals, json!(3)),
                    next_page_offset: Some(2),
                    next_page_id: None,
                },
            ],
            default_next_page_offset: None,
            default_next_page_id: Some(second),
        });

        let removed = draft.remove_page(second).unwrap();
        assert_eq!(removed.fields.len(), 1);
        let logic = draft.pages[0].conditional_logic.as_ref().unwrap();
        // Only the rule aimed at the third page survives, now one step away
        assert_eq!(logic.rules.len(), 1);
        assert_eq!(logic.rules[0].condition.value, json!(3));
        assert_eq!(logic.rules[0].next_page_offset, Some(1));
        assert_eq!(logic.default_next_page_id, None);
        let order: Vec<i64> = draft.pages.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![first, third]);
    }

    #[test]
    fn test_remove_page_rebases_default_offsets() {
        let mut draft = empty_draft();
        let first = draft.add_page("One");
        let second = draft.add_page("Two");
        draft.add_page("Three");
        draft.add_page("Four");
        draft.pages[0].conditional_logic = Some(ConditionalLogic {
            rules: Vec::new(),
            default_next_page_offset: Some(3),
            default_next_page_id: None,
        });
        draft.pages[1].conditional_logic = Some(ConditionalLogic {
            rules: Vec::new(),
            default_next_page_offset: Some(-1),
            default_next_page_id: None,
        });
        draft.pages[2].conditional_logic = Some(ConditionalLogic {
            rules: Vec::new(),
            default_next_page_offset: Some(-1),
            default_next_page_id: None,
        });

        draft.remove_page(first);
        let defaults: Vec<Option<i64>> = draft
            .pages
            .iter()
            .map(|p| p.conditional_logic.as_ref().and_then(|l| l.default_next_page_offset))
            .collect();
        // "Two" pointed back at the removed page; "Three" still points at "Two"
        assert_eq!(defaults, vec![None, Some(-1), None]);
        assert_eq!(draft.pages[0].id, second);
    }

    #[test]
    fn test_move_page_reorders() {
        let mut draft = empty_draft();
        let a = draft.add_page("A");
        let b = draft.add_page("B");
        let c = draft.add_page("C");
        assert!(draft.move_page(c, 0));
        let order: Vec<i64> = draft.pages.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![c, a, b]);
        assert!(draft.move_page(c, 99));
        assert_eq!(draft.pages.last().map(|p| p.id), Some(c));
        assert!(!draft.move_page(1234, 0));
    }

    #[test]
    fn test_move_page_keeps_offset_targets() {
        let mut draft = empty_draft();
        let a = draft.add_page("A");
        draft.add_page("B");
        let c = draft.add_page("C");
        draft.pages[0].conditional_logic = Some(ConditionalLogic {
            rules: vec![NavigationRule {
                condition: condition("x", Operator::Equals, json!("end")),
                next_page_offset: Some(5),
                next_page_id: None,
            }],
            default_next_page_offset: Some(2),
            default_next_page_id: None,
        });
        draft.pages[1].conditional_logic = Some(ConditionalLogic {
            rules: vec![NavigationRule {
                condition: condition("x", Operator::Equals, json!("c")),
                next_page_offset: Some(1),
                next_page_id: None,
            }],
            default_next_page_offset: None,
            default_next_page_id: None,
        });

        assert!(draft.move_page(c, 0));
        // Order is now C, A, B
        let a_logic = draft.pages[1].conditional_logic.as_ref().unwrap();
        assert_eq!(draft.pages[1].id, a);
        assert_eq!(a_logic.default_next_page_offset, Some(-1));
        assert_eq!(a_logic.rules[0].next_page_offset, Some(5));
        let b_logic = draft.pages[2].conditional_logic.as_ref().unwrap();
        assert_eq!(b_logic.rules[0].next_page_offset, Some(-2));
    }

    #[test]
    fn test_remove_field() {
        let mut draft = empty_draft();
        let page = draft.add_page("One");
        let field = draft.add_field(page, text_field("x")).unwrap();
        assert_eq!(draft.remove_field(field).map(|f| f.name), Some("x".to_string()));
        assert!(draft.remove_field(field).is_none());
    }

    #[test]
    fn test_reconcile_rewrites_page_references() {
        let mut draft = empty_draft();
        let first = draft.add_page("One");
        let second = draft.add_page("Two");
        let field = draft.add_field(first, text_field("choice")).unwrap();
        draft.pages[0].conditional_logic = Some(ConditionalLogic {
            rules: vec![NavigationRule {
                condition: condition("choice", Operator::Equals, json!("skip")),
                next_page_offset: None,
                next_page_id: Some(second),
            }],
            default_next_page_offset: None,
            default_next_page_id: Some(second),
        });

        let mut ids = IdMap::new();
        ids.insert_page(first, 100);
        ids.insert_page(second, 101);
        ids.insert_field(field, 500);

        let pages = draft.reconcile(7, &ids);
        assert_eq!(pages[0].id, 100);
        assert_eq!(pages[0].form_id, 7);
        assert_eq!(pages[0].sort_order, 1);
        assert_eq!(pages[1].sort_order, 2);
        assert_eq!(pages[0].fields[0].id, 500);
        assert_eq!(pages[0].fields[0].page_id, 100);
        let logic = pages[0].conditional_logic.as_ref().unwrap();
        assert_eq!(logic.rules[0].next_page_id, Some(101));
        assert_eq!(logic.default_next_page_id, Some(101));
    }

    #[test]
    fn test_from_form_round_trips_structure() {
        let form = branching_form();
        let draft = FormDraft::from_form(&form);
        let pages = draft.reconcile(form.id, &IdMap::new());
        assert_eq!(pages.len(), form.pages.len());
        assert_eq!(pages[2].fields[1].name, "card_number");
        assert_eq!(pages[0].conditional_logic, form.pages[0].conditional_logic);
    }

    #[test]
    fn test_draft_payload_validation() {
        let mut draft = empty_draft();
        assert!(draft.validate().is_ok());
        draft.slug = "Not A Slug".to_string();
        assert!(draft.validate().is_err());
        draft.slug = "ok".to_string();
        draft.name = String::new();
        assert!(draft.validate().is_err());
    }
}

//! FILENAME: app/service/src/store.rs
//! PURPOSE: Storage seam for form definitions.
//! CONTEXT: Form definitions live outside this system. Commands that need a
//! whole form load it through `FormStore`; the in-memory store backs tests
//! and embedding callers that already hold their forms.

use std::collections::HashMap;
use std::sync::RwLock;

use engine::FormDefinition;

use crate::error::ServiceError;

/// Loads form definitions by id. `Ok(None)` means the form does not exist.
pub trait FormStore: Send + Sync {
    fn load_form(&self, form_id: &str) -> Result<Option<FormDefinition>, ServiceError>;
}

#[derive(Debug, Default)]
pub struct InMemoryFormStore {
    forms: RwLock<HashMap<String, FormDefinition>>,
}

impl InMemoryFormStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a form under `form_id`, replacing any previous one.
    pub fn insert(&self, form_id: &str, form: FormDefinition) -> Result<(), ServiceError> {
        let mut forms = self
            .forms
            .write()
            .map_err(|e| ServiceError::Store(e.to_string()))?;
        forms.insert(form_id.to_string(), form);
        Ok(())
    }

    /// Stores a form under its own `id`.
    pub fn insert_form(&self, form: FormDefinition) -> Result<(), ServiceError> {
        let id = form
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ServiceError::Store("form definition has no id".to_string()))?;
        self.insert(&id, form)
    }

    pub fn remove(&self, form_id: &str) -> Result<Option<FormDefinition>, ServiceError> {
        let mut forms = self
            .forms
            .write()
            .map_err(|e| ServiceError::Store(e.to_string()))?;
        Ok(forms.remove(form_id))
    }

    pub fn len(&self) -> usize {
        self.forms.read().map(|forms| forms.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FormStore for InMemoryFormStore {
    fn load_form(&self, form_id: &str) -> Result<Option<FormDefinition>, ServiceError> {
        let forms = self
            .forms
            .read()
            .map_err(|e| ServiceError::Store(e.to_string()))?;
        Ok(forms.get(form_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::FormField;

    #[test]
    fn test_insert_and_load() {
        let store = InMemoryFormStore::new();
        store
            .insert("f1", FormDefinition::new(vec![FormField::new("a", "text")]))
            .unwrap();

        let form = store.load_form("f1").unwrap().unwrap();
        assert_eq!(form.fields.len(), 1);
        assert!(store.load_form("missing").unwrap().is_none());
    }

    #[test]
    fn test_insert_form_requires_id() {
        let store = InMemoryFormStore::new();
        assert!(store.insert_form(FormDefinition::new(vec![])).is_err());

        let mut form = FormDefinition::new(vec![]);
        form.id = Some("intake".to_string());
        store.insert_form(form).unwrap();
        assert_eq!(store.len(), 1);
    }
}

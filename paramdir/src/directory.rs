use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::{ParameterError, Variable, VariableRef};

pub const PATH_SEPARATOR: char = '/';

type Index = IndexMap<String, VariableRef>;

pub fn validate_path(path: &str) -> Result<(), ParameterError> {
    if path.is_empty() || path.split(PATH_SEPARATOR).any(str::is_empty) {
        return Err(ParameterError::MalformedPath(path.to_string()));
    }
    Ok(())
}

/// Hierarchical namespace of named variables.
///
/// All views created through [`ParameterDirectory::scope`] share one flat,
/// insertion-ordered index keyed by full path. Cloning a directory clones the
/// view, not the parameters.
#[derive(Debug, Clone, Default)]
pub struct ParameterDirectory {
    index: Rc<RefCell<Index>>,
    prefix: Option<String>,
}

impl ParameterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn join_prefix(
        &self,
        name: &str,
    ) -> String {
        self.prefix.as_ref().map_or_else(
            || name.to_string(),
            |p| format!("{p}{PATH_SEPARATOR}{name}"),
        )
    }

    fn strip_prefix<'a>(
        &self,
        path: &'a str,
    ) -> Option<&'a str> {
        match &self.prefix {
            None => Some(path),
            Some(prefix) => path
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix(PATH_SEPARATOR)),
        }
    }

    fn full_path(
        &self,
        path: &str,
    ) -> Result<String, ParameterError> {
        validate_path(path)?;
        Ok(self.join_prefix(path))
    }

    /// View rooted at `name` below this directory.
    pub fn scope(
        &self,
        name: &str,
    ) -> Result<Self, ParameterError> {
        Ok(Self {
            index: self.index.clone(),
            prefix: Some(self.full_path(name)?),
        })
    }

    pub fn get_or_create(
        &self,
        path: &str,
        variable: Variable,
    ) -> Result<VariableRef, ParameterError> {
        self.get_or_create_with(path, || variable)
    }

    /// Like `get_or_create`, but only builds the variable when it is missing.
    pub fn get_or_create_with<F>(
        &self,
        path: &str,
        create: F,
    ) -> Result<VariableRef, ParameterError>
    where
        F: FnOnce() -> Variable,
    {
        let full_path = self.full_path(path)?;
        if let Some(existing) = self.index.borrow().get(&full_path) {
            return Ok(existing.clone());
        }

        // The factory may read this directory, so no borrow is held here.
        let variable = create();
        let mut index = self.index.borrow_mut();
        let entry = index.entry(full_path).or_insert_with(|| {
            log::debug!("Creating parameter \"{}\"", self.join_prefix(path));
            variable.into_ref()
        });
        Ok(entry.clone())
    }

    pub fn get_parameter(
        &self,
        path: &str,
    ) -> Option<VariableRef> {
        let full_path = self.full_path(path).ok()?;
        self.index.borrow().get(&full_path).cloned()
    }

    /// Inserts `variable` at `path`, overwriting in place when present so
    /// that outstanding handles observe the new value.
    pub fn set_parameter(
        &self,
        path: &str,
        variable: Variable,
    ) -> Result<VariableRef, ParameterError> {
        let full_path = self.full_path(path)?;
        let mut index = self.index.borrow_mut();
        if let Some(existing) = index.get(&full_path) {
            *existing.borrow_mut() = variable;
            return Ok(existing.clone());
        }
        let handle = variable.into_ref();
        index.insert(full_path, handle.clone());
        Ok(handle)
    }

    pub fn remove(
        &self,
        path: &str,
    ) -> Option<VariableRef> {
        let full_path = self.full_path(path).ok()?;
        self.index.borrow_mut().shift_remove(&full_path)
    }

    pub fn contains(
        &self,
        path: &str,
    ) -> bool {
        self.get_parameter(path).is_some()
    }

    /// Ordered `(path, handle)` pairs under this view, with paths relative to
    /// the view's prefix.
    pub fn get_parameters(&self) -> Vec<(String, VariableRef)> {
        self.index
            .borrow()
            .iter()
            .filter_map(|(path, variable)| {
                self.strip_prefix(path)
                    .map(|name| (name.to_string(), variable.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        match &self.prefix {
            None => self.index.borrow().len(),
            Some(_) => self
                .index
                .borrow()
                .keys()
                .filter(|path| self.strip_prefix(path).is_some())
                .count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every parameter under this view.
    pub fn clear(&self) {
        let mut index = self.index.borrow_mut();
        match &self.prefix {
            None => index.clear(),
            Some(_) => index.retain(|path, _| self.strip_prefix(path).is_none()),
        }
    }

    pub fn shares_storage_with(
        &self,
        other: &ParameterDirectory,
    ) -> bool {
        Rc::ptr_eq(&self.index, &other.index)
    }
}

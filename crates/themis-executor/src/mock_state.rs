// Copyright (c) Themis Contributors
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use themis_types::{FinderError, Object, ObjectFinder};

/// Flat in-memory world state for command tests; append is last-write-wins
/// just like a staged tree view.
#[derive(Default)]
pub(crate) struct MockState {
    objects: BTreeMap<String, Object>,
}

impl MockState {
    pub fn new() -> Self {
        MockState::default()
    }

    pub fn put(&mut self, id: impl Into<String>, object: Object) -> &mut Self {
        self.objects.insert(id.into(), object);
        self
    }
}

impl ObjectFinder for MockState {
    fn query(&self, target_id: &str) -> Result<Object, FinderError> {
        self.objects
            .get(target_id)
            .cloned()
            .ok_or_else(|| FinderError::not_found(target_id))
    }

    fn append(&mut self, target_id: &str, object: Object) -> Result<(), FinderError> {
        self.objects.insert(target_id.to_string(), object);
        Ok(())
    }
}

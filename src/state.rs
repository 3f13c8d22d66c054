// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::PathBuf;
use std::sync::Arc;

use crate::grants::GrantEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<GrantEngine>,
    /// Directory holding the grant database, checked by the readiness probe
    pub data_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(engine: Arc<GrantEngine>) -> Self {
        Self {
            engine,
            data_dir: None,
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }
}

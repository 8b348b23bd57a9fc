// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::auth::AuthPipeline;
use crate::store::InMemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthPipeline,
    pub store: Arc<RwLock<InMemoryStore>>,
}

impl AppState {
    pub fn new(auth: AuthPipeline, store: InMemoryStore) -> Self {
        Self {
            auth,
            store: Arc::new(RwLock::new(store)),
        }
    }
}

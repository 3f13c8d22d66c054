// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test doubles shared across modules.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::grants::events::channel;
use crate::grants::{GrantEngine, InMemoryGroupDirectory};
use crate::signer::{ObjectSigner, Operation, SignerError};
use crate::storage::InMemoryGrantStore;

/// Signer that records every call and produces unique fake URLs.
#[derive(Default)]
pub(crate) struct RecordingSigner {
    signed: Mutex<Vec<(String, Operation)>>,
    deleted: Mutex<Vec<String>>,
    counter: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingSigner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn sign_count(&self) -> usize {
        self.signed.lock().unwrap().len()
    }

    pub(crate) fn signed_operations(&self) -> Vec<Operation> {
        self.signed.lock().unwrap().iter().map(|(_, op)| *op).collect()
    }

    pub(crate) fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectSigner for RecordingSigner {
    async fn sign(
        &self,
        object_key: &str,
        operation: Operation,
        ttl: Duration,
    ) -> Result<String, SignerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SignerError::Request("signer offline".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.signed
            .lock()
            .unwrap()
            .push((object_key.to_string(), operation));
        Ok(format!(
            "https://objects.test/{object_key}?method={}&ttl={}&n={n}",
            operation.method(),
            ttl.as_secs()
        ))
    }

    async fn delete_object(&self, object_key: &str) -> Result<(), SignerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SignerError::Status {
                status: 503,
                key: object_key.to_string(),
            });
        }
        self.deleted.lock().unwrap().push(object_key.to_string());
        Ok(())
    }
}

/// Engine over in-memory parts, with handles to inspect them.
pub(crate) struct TestEngine {
    pub engine: Arc<GrantEngine>,
    pub store: Arc<InMemoryGrantStore>,
    pub signer: Arc<RecordingSigner>,
    pub directory: Arc<InMemoryGroupDirectory>,
}

pub(crate) fn test_engine() -> TestEngine {
    let store = Arc::new(InMemoryGrantStore::new());
    let signer = Arc::new(RecordingSigner::new());
    let directory = Arc::new(InMemoryGroupDirectory::new());
    let (events, _) = channel(64);
    let engine = Arc::new(GrantEngine::new(
        store.clone(),
        signer.clone(),
        directory.clone(),
        events,
    ));
    TestEngine {
        engine,
        store,
        signer,
        directory,
    }
}

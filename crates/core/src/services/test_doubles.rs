//! Recording test doubles shared by the service tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use vestibule_common::storage::AttachmentStore;
use vestibule_common::{AppError, AppResult};

use super::email::NotificationGateway;
use super::host::{AccountDirectory, HostHooks};

/// One recorded outbound email.
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Gateway that records every send attempt; optionally fails them all.
pub struct RecordingGateway {
    pub sent: Mutex<Vec<SentMail>>,
    fail: bool,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        if self.fail {
            return Err(AppError::Mail("relay refused the message".to_string()));
        }
        Ok(())
    }
}

/// In-memory attachment store.
pub struct MemoryStorage {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    fail_put: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            fail_put: false,
        }
    }

    pub fn failing_put() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            fail_put: true,
        }
    }
}

#[async_trait]
impl AttachmentStore for MemoryStorage {
    async fn put(&self, key: &str, data: &[u8]) -> AppResult<()> {
        if self.fail_put {
            return Err(AppError::Storage("disk full".to_string()));
        }
        self.files
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn read(&self, key: &str) -> AppResult<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::Storage(format!("no such attachment: {key}")))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.files.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.files.lock().unwrap().contains_key(key))
    }
}

/// Directory double with a fixed answer.
pub struct StaticDirectory {
    pub exists: bool,
}

#[async_trait]
impl AccountDirectory for StaticDirectory {
    async fn name_exists(&self, _name: &str) -> AppResult<bool> {
        Ok(self.exists)
    }
}

/// Host hooks double recording every call.
#[derive(Default)]
pub struct RecordingHooks {
    pub granted: Mutex<Vec<(String, String)>>,
    pub seeded_pages: Mutex<Vec<(String, String)>>,
    pub welcomes: Mutex<Vec<String>>,
    pub fail_grant: bool,
    pub fail_seed: bool,
}

#[async_trait]
impl HostHooks for RecordingHooks {
    async fn grant_group(&self, user_id: &str, group: &str) -> AppResult<()> {
        if self.fail_grant {
            return Err(AppError::ExternalService(
                "group grant refused".to_string(),
            ));
        }
        self.granted
            .lock()
            .unwrap()
            .push((user_id.to_string(), group.to_string()));
        Ok(())
    }

    async fn seed_user_page(&self, user_name: &str, body: &str) -> AppResult<()> {
        if self.fail_seed {
            return Err(AppError::ExternalService("page edit failed".to_string()));
        }
        self.seeded_pages
            .lock()
            .unwrap()
            .push((user_name.to_string(), body.to_string()));
        Ok(())
    }

    async fn post_welcome(&self, user_name: &str, _request_type: i32) -> AppResult<()> {
        self.welcomes.lock().unwrap().push(user_name.to_string());
        Ok(())
    }
}

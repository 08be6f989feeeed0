#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use posterity_delivery::{
    DeliveryScheduler, FixedClock, LetterContent, Notifier, NotifyError, Receipt,
};
use posterity_store::{Letter, Recipient, RecordStore, TestStore};
use tokio::sync::{Notify, Semaphore};

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

#[derive(Debug, Clone)]
enum Response {
    Fail(String),
    Panic,
}

/// Notifier that succeeds unless told otherwise for an address
#[derive(Debug, Default)]
pub struct StubNotifier {
    responses: Mutex<HashMap<String, Response>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl StubNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, address: &str, detail: &str) {
        self.responses
            .lock()
            .insert(address.to_string(), Response::Fail(detail.to_string()));
    }

    pub fn panic_for(&self, address: &str) {
        self.responses
            .lock()
            .insert(address.to_string(), Response::Panic);
    }

    pub fn succeed_for(&self, address: &str) {
        self.responses.lock().remove(address);
    }

    pub fn calls_for(&self, address: &str) -> usize {
        self.calls.lock().get(address).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl Notifier for StubNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        _letter: &LetterContent,
    ) -> Result<Receipt, NotifyError> {
        *self
            .calls
            .lock()
            .entry(recipient.address.clone())
            .or_default() += 1;

        let response = self.responses.lock().get(&recipient.address).cloned();
        match response {
            None => Ok(Receipt {
                message_id: Some(format!("msg-{}", recipient.address)),
            }),
            Some(Response::Fail(detail)) => Err(NotifyError::Rejected(detail)),
            Some(Response::Panic) => panic!("stub notifier panicked for {}", recipient.address),
        }
    }
}

/// Notifier that blocks inside `send` until released
#[derive(Debug)]
pub struct GatedNotifier {
    pub entered: Notify,
    release: Semaphore,
    calls: Mutex<usize>,
}

impl GatedNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
            calls: Mutex::new(0),
        })
    }

    pub fn release(&self) {
        self.release.add_permits(1);
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Notifier for GatedNotifier {
    async fn send(
        &self,
        _recipient: &Recipient,
        _letter: &LetterContent,
    ) -> Result<Receipt, NotifyError> {
        *self.calls.lock() += 1;
        self.entered.notify_one();

        self.release
            .acquire()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .forget();

        Ok(Receipt::default())
    }
}

/// Insert a recipient at `address` and one letter for them due at `due_at`
pub async fn add_letter(store: &TestStore, address: &str, due_at: DateTime<Utc>) -> Letter {
    let recipient = Recipient::new(Some("Future Me".to_string()), address);
    store.insert_recipient(recipient.clone()).await.unwrap();

    let letter = Letter::new(
        recipient.id,
        Some("Hello".to_string()),
        "Remember this?",
        due_at - Duration::days(365),
        due_at,
    );
    store.insert_letter(letter.clone()).await.unwrap();
    letter
}

/// An initialized scheduler over `store` and `notifier`, reading time from `clock`
pub fn scheduler(
    store: &Arc<TestStore>,
    notifier: Arc<dyn Notifier>,
    clock: &FixedClock,
) -> Arc<DeliveryScheduler> {
    let mut scheduler = DeliveryScheduler::default().with_clock(Arc::new(clock.clone()));
    scheduler
        .init(Arc::clone(store) as Arc<dyn RecordStore>, notifier)
        .unwrap();
    Arc::new(scheduler)
}

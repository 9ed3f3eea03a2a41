//! Implements the `Api` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without the remote API.

use crate::api::Api;
use crate::model::{Category, DeletePayload, Transaction, TransactionPayload};
use crate::Result;
use anyhow::{bail, Context};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::{LazyLock, Mutex};

/// The email address of the user whose data is seeded into a fresh `TestApi`.
pub(crate) const DEMO_EMAIL: &str = "demo@example.com";

/// All `TestApi` data, keyed by the API URL it stands in for.
static STATE: LazyLock<Mutex<HashMap<String, TestApiState>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// The data held by a `TestApi`, plus a log of the calls it received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TestApiState {
    /// Transactions by owner email, in insertion order.
    pub(crate) transactions: BTreeMap<String, Vec<Transaction>>,
    /// One entry per request, e.g. `"list demo@example.com"` or `"delete 3"`.
    pub(crate) calls: Vec<String>,
    /// When set, every request fails with this message.
    pub(crate) fail: Option<String>,
}

impl TestApiState {
    /// State containing only the seed data for `DEMO_EMAIL`.
    pub(crate) fn seeded() -> Self {
        let mut transactions = BTreeMap::new();
        transactions.insert(DEMO_EMAIL.to_string(), seed_data());
        Self {
            transactions,
            calls: Vec::new(),
            fail: None,
        }
    }
}

/// An implementation of the `Api` trait that does not use the network. Instances created with the
/// same key share their data for the life of the process.
pub(crate) struct TestApi {
    key: String,
}

impl TestApi {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        STATE
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.clone())
            .or_insert_with(TestApiState::seeded);
        Self { key }
    }

    #[cfg(test)]
    pub(crate) fn get_state(&self) -> TestApiState {
        self.with_state(|state| state.clone())
    }

    #[cfg(test)]
    pub(crate) fn set_state(&self, new_state: TestApiState) {
        self.with_state(|state| *state = new_state)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TestApiState) -> T) -> T {
        let mut guard = STATE.lock().unwrap_or_else(|e| e.into_inner());
        let state = guard.entry(self.key.clone()).or_default();
        f(state)
    }

    /// Records the call and fails if the state says so.
    fn call(&self, state: &mut TestApiState, call: String) -> Result<()> {
        state.calls.push(call);
        if let Some(message) = &state.fail {
            bail!("{message}");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Api for TestApi {
    async fn list(&self, email: &str) -> Result<Vec<Transaction>> {
        self.with_state(|state| {
            self.call(state, format!("list {email}"))?;
            Ok(state.transactions.get(email).cloned().unwrap_or_default())
        })
    }

    async fn create(&self, payload: &TransactionPayload) -> Result<()> {
        self.with_state(|state| {
            self.call(state, format!("create {}", payload.id))?;
            state
                .transactions
                .entry(payload.email.clone())
                .or_default()
                .push(payload.transaction());
            Ok(())
        })
    }

    async fn update(&self, payload: &TransactionPayload) -> Result<()> {
        self.with_state(|state| {
            self.call(state, format!("update {}", payload.id))?;
            let existing = state
                .transactions
                .get_mut(&payload.email)
                .and_then(|list| list.iter_mut().find(|t| t.id() == payload.id))
                .with_context(|| format!("Transaction not found: {}", payload.id))?;
            *existing = payload.transaction();
            Ok(())
        })
    }

    async fn delete(&self, payload: &DeletePayload) -> Result<()> {
        self.with_state(|state| {
            self.call(state, format!("delete {}", payload.id))?;
            let list = state
                .transactions
                .get_mut(&payload.email)
                .with_context(|| format!("Transaction not found: {}", payload.id))?;
            let before = list.len();
            list.retain(|t| t.id() != payload.id);
            if list.len() == before {
                bail!("Transaction not found: {}", payload.id);
            }
            Ok(())
        })
    }
}

/// Seed transactions for `DEMO_EMAIL`. Deliberately unsorted.
fn seed_data() -> Vec<Transaction> {
    let rows: [(&str, i32, Category, (i32, u32, u32)); 8] = [
        ("1704067200000", -50, Category::Food, (2024, 1, 1)),
        ("1704412800000", 2000, Category::Salary, (2024, 1, 5)),
        ("1704153600000", -1200, Category::Rent, (2024, 1, 2)),
        ("1704844800000", -85, Category::Utilities, (2024, 1, 10)),
        ("1705276800000", -42, Category::Entertainment, (2024, 1, 15)),
        ("1705708800000", -23, Category::Food, (2024, 1, 20)),
        ("1706054400000", -310, Category::Travel, (2024, 1, 24)),
        ("1706659200000", 2000, Category::Salary, (2024, 1, 31)),
    ];
    rows.into_iter()
        .filter_map(|(id, amount, category, (y, m, d))| {
            NaiveDate::from_ymd_opt(y, m, d).map(|date| Transaction::new(id, amount, category, date))
        })
        .collect()
}

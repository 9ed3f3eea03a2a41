//! The transaction view-model.
//!
//! `Dashboard` holds the client-side copy of the user's transactions together with the state of
//! the add/edit form, the category filter and the current page. Every mutation goes to the `Api`
//! first and is applied locally only when the request succeeds, so a failed request leaves the
//! dashboard exactly as it was. The collection is kept sorted by date, newest first.

mod confirm;
mod page;
pub mod render;
mod summary;

use crate::api::Api;
use crate::model::{generate_id, sort_by_date_desc, Category, DeletePayload, Draft, Transaction};
use crate::Result;
use anyhow::{bail, Context};
use serde::Serialize;
use tracing::{debug, info, warn};

pub use confirm::{Answer, Confirm, StdinConfirm};
pub use page::{filtered, page_of, Page, PAGE_SIZE};
pub use summary::{category_breakdown, totals, CategorySlice, Totals};

pub const LOAD_FAILED: &str = "Failed to load transactions. Please try again later.";
pub const SAVE_FAILED: &str = "Failed to save transaction.";
pub const DELETE_FAILED: &str = "Failed to delete transaction.";
pub const CONFIRM_DELETE: &str = "Are you sure you want to delete this transaction?";

/// The state of the most recent load.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// Identifies one load. Only the response to the most recently started load is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

/// Everything derived from the dashboard that is needed to present it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct View {
    pub totals: Totals,
    pub breakdown: Vec<CategorySlice>,
    pub page: Page,
    pub filter: Option<Category>,
    pub editing: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    transactions: Vec<Transaction>,
    draft: Draft,
    editing: Option<String>,
    filter: Option<Category>,
    page: usize,
    latest_ticket: u64,
    load_state: LoadState,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
            draft: Draft::default(),
            editing: None,
            filter: None,
            page: 1,
            latest_ticket: 0,
            load_state: LoadState::Idle,
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    pub fn set_draft(&mut self, draft: Draft) {
        self.draft = draft;
    }

    /// The id of the transaction being edited, if any.
    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn filter(&self) -> Option<Category> {
        self.filter
    }

    /// The current page, 1-based.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Fetches all of `email`'s transactions and replaces the local collection with them. On
    /// failure the previous collection is kept.
    pub async fn load(&mut self, api: &dyn Api, email: &str) -> Result<()> {
        let ticket = self.begin_load();
        let result = api.list(email).await;
        self.finish_load(ticket, result).map(|_| ())
    }

    /// Marks the start of a load and returns its ticket.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.latest_ticket += 1;
        self.load_state = LoadState::Loading;
        LoadTicket(self.latest_ticket)
    }

    /// Applies the response to the load identified by `ticket`. Returns `Ok(false)` without
    /// changing anything when a newer load has been started since.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Transaction>>,
    ) -> Result<bool> {
        if ticket.0 != self.latest_ticket {
            debug!(
                "Discarding the response to load {} because load {} is newer",
                ticket.0, self.latest_ticket
            );
            return Ok(false);
        }
        match result {
            Ok(mut transactions) => {
                sort_by_date_desc(&mut transactions);
                debug!("Loaded {} transactions", transactions.len());
                self.transactions = transactions;
                self.load_state = LoadState::Loaded;
                Ok(true)
            }
            Err(e) => {
                warn!("Error fetching transactions: {e:#}");
                self.load_state = LoadState::Failed(LOAD_FAILED.to_string());
                Err(e.context(LOAD_FAILED))
            }
        }
    }

    /// Saves the form: updates the transaction being edited, or creates a new one.
    pub async fn save(&mut self, api: &dyn Api, email: &str) -> Result<Transaction> {
        let draft = self.draft.clone();
        let editing = self.editing.clone();
        self.save_draft(api, email, &draft, editing.as_deref()).await
    }

    /// Validates `draft`, sends it to the API and, if that succeeds, applies it locally and
    /// clears the form. With `editing` the transaction with that id is updated, otherwise a new
    /// transaction is created.
    pub async fn save_draft(
        &mut self,
        api: &dyn Api,
        email: &str,
        draft: &Draft,
        editing: Option<&str>,
    ) -> Result<Transaction> {
        let id = match editing {
            Some(id) => {
                self.position(id)?;
                id.to_string()
            }
            None => generate_id(&self.transactions),
        };
        let transaction = draft.to_transaction(id)?;
        let payload = transaction.payload(email);

        let result = match editing {
            Some(_) => api.update(&payload).await,
            None => api.create(&payload).await,
        };
        result.context(SAVE_FAILED)?;

        match editing {
            Some(id) => {
                let index = self.position(id)?;
                self.transactions[index] = transaction.clone();
                info!("Updated transaction {id}");
            }
            None => {
                self.transactions.insert(0, transaction.clone());
                info!("Added transaction {}", transaction.id());
            }
        }
        sort_by_date_desc(&mut self.transactions);
        self.draft = Draft::default();
        self.editing = None;
        Ok(transaction)
    }

    /// Deletes the transaction with `id` once `confirm` agrees. Returns `false`, having sent
    /// nothing, when it does not.
    pub async fn remove(
        &mut self,
        api: &dyn Api,
        email: &str,
        id: &str,
        confirm: &mut dyn Confirm,
    ) -> Result<bool> {
        self.position(id)?;
        if !confirm.confirm(CONFIRM_DELETE)? {
            debug!("Delete of {id} was not confirmed");
            return Ok(false);
        }
        let payload = DeletePayload {
            id: id.to_string(),
            email: email.to_string(),
        };
        api.delete(&payload).await.context(DELETE_FAILED)?;

        self.transactions.retain(|t| t.id() != id);
        sort_by_date_desc(&mut self.transactions);
        if self.editing.as_deref() == Some(id) {
            self.cancel_edit();
        }
        info!("Deleted transaction {id}");
        Ok(true)
    }

    /// Fills the form from the transaction with `id` and remembers that it is being edited.
    pub fn begin_edit(&mut self, id: &str) -> Result<()> {
        let index = self.position(id)?;
        self.draft = Draft::from_transaction(&self.transactions[index]);
        self.editing = Some(id.to_string());
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.draft = Draft::default();
        self.editing = None;
    }

    /// Shows only `filter`'s transactions, or all of them for `None`. Always goes back to page 1.
    pub fn set_filter(&mut self, filter: Option<Category>) {
        self.filter = filter;
        self.page = 1;
    }

    /// Moves to the next page if there is one.
    pub fn next_page(&mut self) -> bool {
        if self.current_page().has_next {
            self.page += 1;
            true
        } else {
            false
        }
    }

    /// Moves to the previous page if there is one.
    pub fn prev_page(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    /// Moves to `page`, clamped to the pages that exist.
    pub fn set_page(&mut self, page: usize) {
        let last = self.current_page().page_count();
        self.page = page.clamp(1, last);
    }

    pub fn totals(&self) -> Totals {
        totals(&self.transactions)
    }

    pub fn breakdown(&self) -> Vec<CategorySlice> {
        category_breakdown(&self.transactions)
    }

    pub fn current_page(&self) -> Page {
        page_of(&self.transactions, self.filter, self.page)
    }

    pub fn view(&self) -> View {
        View {
            totals: self.totals(),
            breakdown: self.breakdown(),
            page: self.current_page(),
            filter: self.filter,
            editing: self.editing.clone(),
            error: match &self.load_state {
                LoadState::Failed(message) => Some(message.clone()),
                _ => None,
            },
        }
    }

    fn position(&self, id: &str) -> Result<usize> {
        match self.transactions.iter().position(|t| t.id() == id) {
            Some(index) => Ok(index),
            None => bail!("There is no transaction with id '{id}'"),
        }
    }
}

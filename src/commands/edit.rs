use crate::api::Mode;
use crate::args::EditArgs;
use crate::commands::{Out, Screen};
use crate::dashboard::View;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};

/// Handles `fintrack edit`: starts editing the transaction, replaces the fields that were given
/// and saves it.
pub async fn edit(config: &Config, mode: Mode, args: &EditArgs) -> Result<Out<View>> {
    let mut screen = Screen::open(config, mode).await?;
    screen
        .dashboard
        .begin_edit(args.id())
        .pub_result(ErrorType::Mutation)?;

    let draft = screen.dashboard.draft_mut();
    if let Some(amount) = args.amount() {
        draft.amount = amount.to_string();
    }
    if let Some(category) = args.category() {
        draft.category = category.to_string();
    }
    if let Some(date) = args.date() {
        draft.date = date.to_string();
    }

    let saved = screen
        .dashboard
        .save(screen.api.as_ref(), &screen.email)
        .await
        .pub_result(ErrorType::Mutation)?;
    Ok(screen.out(format!(
        "Updated transaction {}: {} {} on {}",
        saved.id(),
        saved.category(),
        saved.amount(),
        saved.date()
    )))
}

use crate::api::Mode;
use crate::args::AddArgs;
use crate::commands::{Out, Screen};
use crate::dashboard::View;
use crate::error::{ErrorType, IntoResult};
use crate::model::Draft;
use crate::{Config, Result};

/// Handles `fintrack add`: creates a transaction and renders the dashboard. The sign of the
/// amount is decided by the category.
pub async fn add(config: &Config, mode: Mode, args: &AddArgs) -> Result<Out<View>> {
    let mut screen = Screen::open(config, mode).await?;
    screen
        .dashboard
        .set_draft(Draft::new(args.amount(), args.category(), args.date()));
    let saved = screen
        .dashboard
        .save(screen.api.as_ref(), &screen.email)
        .await
        .pub_result(ErrorType::Mutation)?;
    Ok(screen.out(format!(
        "Added transaction {}: {} {} on {}",
        saved.id(),
        saved.category(),
        saved.amount(),
        saved.date()
    )))
}

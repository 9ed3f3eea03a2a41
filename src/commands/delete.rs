//! Delete command handler.

use crate::api::Mode;
use crate::args::DeleteArgs;
use crate::commands::{Out, Screen};
use crate::dashboard::{Answer, Confirm, View};
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};

/// Deletes one transaction by ID after asking `confirm`, unless `--yes` was given. When the
/// answer is no, nothing is sent and the dashboard is shown unchanged.
pub async fn delete(
    config: &Config,
    mode: Mode,
    args: &DeleteArgs,
    confirm: &mut dyn Confirm,
) -> Result<Out<View>> {
    let mut screen = Screen::open(config, mode).await?;
    let mut yes = Answer(true);
    let confirm: &mut dyn Confirm = if args.yes() { &mut yes } else { confirm };
    let deleted = screen
        .dashboard
        .remove(screen.api.as_ref(), &screen.email, args.id(), confirm)
        .await
        .pub_result(ErrorType::Mutation)?;
    let message = if deleted {
        format!("Deleted transaction {}", args.id())
    } else {
        "Nothing was deleted".to_string()
    };
    Ok(screen.out(message))
}

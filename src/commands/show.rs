use crate::api::Mode;
use crate::args::ShowArgs;
use crate::commands::{Out, Screen};
use crate::dashboard::View;
use crate::{Config, Result};

/// Handles `fintrack show`: loads the transactions and renders the dashboard, optionally filtered
/// to one category and at a given page.
pub async fn show(config: &Config, mode: Mode, args: &ShowArgs) -> Result<Out<View>> {
    let mut screen = Screen::open(config, mode).await?;
    screen.dashboard.set_filter(args.category());
    screen.dashboard.set_page(args.page());
    let page = screen.dashboard.current_page();
    let message = format!(
        "Showing page {} of {}, {} matching transaction{}",
        page.page,
        page.page_count(),
        page.filtered_count,
        if page.filtered_count == 1 { "" } else { "s" }
    );
    Ok(screen.out(message))
}

use std::path::Path;

use anyhow::Context as _;
use checkin_store::{GuestFilter, NewGuest};
use tracing::warn;

use super::{Context, print_json};

pub fn add(ctx: &Context, event: &str, guest: NewGuest) -> anyhow::Result<()> {
    print_json(&ctx.store.create_guest(event, guest)?)
}

pub fn list(
    ctx: &Context,
    event: &str,
    search: Option<String>,
    checked_in: Option<bool>,
) -> anyhow::Result<()> {
    let filter = GuestFilter { search, checked_in };
    print_json(&ctx.store.list_guests(event, &filter)?)
}

/// Import guests from a JSON array of `{full_name, phone, ...}` objects.
pub fn import(ctx: &Context, event: &str, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let rows: Vec<NewGuest> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", file.display()))?;

    let report = ctx.store.bulk_create_guests(event, rows)?;
    for rejection in &report.rejected {
        warn!(row = rejection.row, reason = %rejection.reason, "row skipped");
    }
    print_json(&report)
}

pub fn delete(ctx: &Context, event: &str, guest: &str) -> anyhow::Result<()> {
    let changes = ctx.store.delete_guest(event, guest, &ctx.actor)?;
    ctx.announce(&changes);
    Ok(())
}

pub fn check_in(ctx: &Context, event: &str, guest: &str) -> anyhow::Result<()> {
    let (guest, change) = ctx.store.check_in(event, guest, &ctx.actor)?;
    print_json(&guest)?;
    ctx.announce(&[change]);
    Ok(())
}

pub fn check_out(ctx: &Context, event: &str, guest: &str) -> anyhow::Result<()> {
    let (guest, change) = ctx.store.check_out(event, guest, &ctx.actor)?;
    print_json(&guest)?;
    ctx.announce(&[change]);
    Ok(())
}

use super::{Context, print_json};

pub fn assign(ctx: &Context, event: &str, table: &str, seat: &str, guest: &str) -> anyhow::Result<()> {
    let outcome = ctx.store.assign(event, table, seat, guest, &ctx.actor)?;
    print_json(&outcome.guest)?;
    ctx.announce(&outcome.changes);
    Ok(())
}

pub fn unassign(ctx: &Context, event: &str, table: &str, seat: &str, guest: &str) -> anyhow::Result<()> {
    let outcome = ctx.store.unassign(event, table, seat, guest, &ctx.actor)?;
    print_json(&outcome.guest)?;
    ctx.announce(&outcome.changes);
    Ok(())
}

/// Exit with an error if any seat and guest placement disagree.
pub fn verify(ctx: &Context, event: &str) -> anyhow::Result<()> {
    ctx.store.get_event(event)?;
    let violations = ctx.store.check_integrity(event)?;
    print_json(&violations)?;
    if !violations.is_empty() {
        anyhow::bail!("{} integrity violation(s) in event {event}", violations.len());
    }
    Ok(())
}

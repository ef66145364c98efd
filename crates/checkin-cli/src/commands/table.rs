use checkin_store::{NewTable, Position, TableShape};

use super::{Context, print_json};

pub fn add(
    ctx: &Context,
    event: &str,
    shape: TableShape,
    num_seats: u32,
    (width, height): (f64, f64),
    (x, y): (f64, f64),
    rotation: f64,
) -> anyhow::Result<()> {
    let (table, change) = ctx.store.add_table(
        event,
        NewTable {
            shape,
            position: Position::new(x, y),
            width,
            height,
            num_seats,
            rotation,
        },
        &ctx.actor,
    )?;
    print_json(&table)?;
    ctx.announce(&[change]);
    Ok(())
}

pub fn list(ctx: &Context, event: &str) -> anyhow::Result<()> {
    print_json(&ctx.store.get_layout(event)?)
}

pub fn delete(ctx: &Context, event: &str, table: &str) -> anyhow::Result<()> {
    let outcome = ctx.store.delete_table(event, table, &ctx.actor)?;
    print_json(&outcome.unassigned)?;
    ctx.announce(&outcome.changes);
    Ok(())
}

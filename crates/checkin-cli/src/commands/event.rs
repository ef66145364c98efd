use checkin_store::{DuplicateRequest, NewEvent};
use tracing::info;

use super::{Context, parse_date, print_json};

pub fn create(
    ctx: &Context,
    name: String,
    date: &str,
    location: String,
    description: Option<String>,
) -> anyhow::Result<()> {
    let event = ctx.store.create_scope(NewEvent {
        name,
        date: parse_date(date)?,
        location,
        description,
        created_by: Some(ctx.actor.clone()),
    })?;
    print_json(&event)
}

pub fn list(ctx: &Context, summary: bool) -> anyhow::Result<()> {
    if summary {
        print_json(&ctx.store.list_summaries()?)
    } else {
        print_json(&ctx.store.list_events()?)
    }
}

pub fn show(ctx: &Context, id: &str) -> anyhow::Result<()> {
    print_json(&ctx.store.event_summary(id)?)
}

pub fn delete(ctx: &Context, id: &str) -> anyhow::Result<()> {
    if !ctx.store.delete_scope(id)? {
        anyhow::bail!("event {id} does not exist");
    }
    info!(event_id = id, "deleted");
    Ok(())
}

pub fn duplicate(
    ctx: &Context,
    id: &str,
    new_name: String,
    date: &str,
    copy_layout: bool,
    copy_guests: bool,
) -> anyhow::Result<()> {
    let event = ctx.store.duplicate_scope(
        id,
        DuplicateRequest {
            new_name,
            new_date: parse_date(date)?,
            copy_layout,
            copy_guests,
        },
    )?;
    print_json(&event)
}

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "checkin",
    about = "Event check-in: events, seating and guest arrival",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to checkin.toml (defaults are used if it does not exist)
    #[arg(short, long, default_value = "checkin.toml", global = true)]
    config: PathBuf,
    /// Override [storage].data_dir from the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Actor id recorded in audit fields and change events
    #[arg(long, default_value = "cli", global = true)]
    actor: String,
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, inspect, duplicate and delete events
    Event {
        #[command(subcommand)]
        action: EventAction,
    },
    /// Manage the table layout of an event
    Table {
        #[command(subcommand)]
        action: TableAction,
    },
    /// Manage the guest list of an event
    Guest {
        #[command(subcommand)]
        action: GuestAction,
    },
    /// Assign guests to seats
    Seat {
        #[command(subcommand)]
        action: SeatAction,
    },
    /// Mark a guest as arrived
    Checkin { event: String, guest: String },
    /// Mark a checked-in guest as gone
    Checkout { event: String, guest: String },
    /// Report seats and guest placements that disagree
    Verify { event: String },
    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum EventAction {
    Create {
        #[arg(long)]
        name: String,
        /// RFC 3339 timestamp, e.g. 2026-06-01T18:00:00Z
        #[arg(long)]
        date: String,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long)]
        description: Option<String>,
    },
    List {
        /// Include guest and seat counters
        #[arg(long)]
        summary: bool,
    },
    Show { id: String },
    Delete { id: String },
    Duplicate {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        date: String,
        #[arg(long)]
        copy_layout: bool,
        #[arg(long)]
        copy_guests: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Shape {
    Round,
    Rectangular,
}

#[derive(Subcommand)]
enum TableAction {
    Add {
        event: String,
        #[arg(long, value_enum, default_value = "round")]
        shape: Shape,
        #[arg(long, default_value = "8")]
        seats: u32,
        #[arg(long, default_value = "120")]
        width: f64,
        #[arg(long, default_value = "120")]
        height: f64,
        #[arg(long, default_value = "0")]
        x: f64,
        #[arg(long, default_value = "0")]
        y: f64,
        #[arg(long, default_value = "0")]
        rotation: f64,
    },
    List { event: String },
    Delete { event: String, table: String },
}

#[derive(Subcommand)]
enum GuestAction {
    Add {
        event: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    List {
        event: String,
        /// Substring of name or phone
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long)]
        checked_in: Option<bool>,
    },
    /// Import a JSON array of guests
    Import { event: String, file: PathBuf },
    Delete { event: String, guest: String },
}

#[derive(Subcommand)]
enum SeatAction {
    Assign {
        event: String,
        table: String,
        seat: String,
        guest: String,
    },
    Unassign {
        event: String,
        table: String,
        seat: String,
        guest: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info,checkin=debug"))?;
    let logs = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        logs.json().init();
    } else {
        logs.init();
    }

    let mut config = checkin_core::CheckinConfig::load_or_default(&cli.config)?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }
    config.validate()?;

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let ctx = commands::Context::open(&config, cli.actor)?;
    match cli.command {
        Commands::Event { action } => match action {
            EventAction::Create {
                name,
                date,
                location,
                description,
            } => commands::event::create(&ctx, name, &date, location, description),
            EventAction::List { summary } => commands::event::list(&ctx, summary),
            EventAction::Show { id } => commands::event::show(&ctx, &id),
            EventAction::Delete { id } => commands::event::delete(&ctx, &id),
            EventAction::Duplicate {
                id,
                name,
                date,
                copy_layout,
                copy_guests,
            } => commands::event::duplicate(&ctx, &id, name, &date, copy_layout, copy_guests),
        },
        Commands::Table { action } => match action {
            TableAction::Add {
                event,
                shape,
                seats,
                width,
                height,
                x,
                y,
                rotation,
            } => commands::table::add(
                &ctx,
                &event,
                shape.into(),
                seats,
                (width, height),
                (x, y),
                rotation,
            ),
            TableAction::List { event } => commands::table::list(&ctx, &event),
            TableAction::Delete { event, table } => commands::table::delete(&ctx, &event, &table),
        },
        Commands::Guest { action } => match action {
            GuestAction::Add {
                event,
                name,
                phone,
                company,
                email,
                notes,
            } => commands::guest::add(
                &ctx,
                &event,
                checkin_store::NewGuest {
                    full_name: name,
                    phone,
                    company,
                    email,
                    notes,
                },
            ),
            GuestAction::List {
                event,
                search,
                checked_in,
            } => commands::guest::list(&ctx, &event, search, checked_in),
            GuestAction::Import { event, file } => commands::guest::import(&ctx, &event, &file),
            GuestAction::Delete { event, guest } => commands::guest::delete(&ctx, &event, &guest),
        },
        Commands::Seat { action } => match action {
            SeatAction::Assign {
                event,
                table,
                seat,
                guest,
            } => commands::seat::assign(&ctx, &event, &table, &seat, &guest),
            SeatAction::Unassign {
                event,
                table,
                seat,
                guest,
            } => commands::seat::unassign(&ctx, &event, &table, &seat, &guest),
        },
        Commands::Checkin { event, guest } => commands::guest::check_in(&ctx, &event, &guest),
        Commands::Checkout { event, guest } => commands::guest::check_out(&ctx, &event, &guest),
        Commands::Verify { event } => commands::seat::verify(&ctx, &event),
        Commands::Config => Ok(()),
    }
}

impl From<Shape> for checkin_store::TableShape {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Round => checkin_store::TableShape::Round,
            Shape::Rectangular => checkin_store::TableShape::Rectangular,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "checkin", "seat", "assign", "EV1", "t1", "s1", "g1", "--actor", "door-2",
        ])
        .unwrap();
        assert_eq!(cli.actor, "door-2");
        assert!(matches!(
            cli.command,
            Commands::Seat {
                action: SeatAction::Assign { .. }
            }
        ));
    }
}

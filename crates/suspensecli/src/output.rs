use std::fmt::Write;

use prettytable::format::consts::FORMAT_CLEAN;
use prettytable::{Row, Table, cell, row};
use suspense_resource::suspense::Failure;

use crate::render::View;
use crate::user::User;

/// The placeholder shown while a user is loading.
pub fn skeleton() -> String {
    [
        "(.) ░░░░░░░░░░░░░░░░",
        "    ░░░░░░░░",
        "    ░░░░░░░░░░░░░░░░░░░░░░░░",
        "    ░░░░░░░░░░░░░░░░░░",
        "    ░░░░░░░░░░░░░░░░░░░░",
    ]
    .join("\n")
}

pub fn card(user: &User) -> String {
    let mut out = String::new();
    writeln!(out, "({}) {}", user.initial(), user.name).ok();
    writeln!(out, "    @{}", user.username).ok();
    writeln!(out, "    email    {}", user.email).ok();
    writeln!(out, "    phone    {}", user.phone).ok();
    write!(out, "    website  {}", user.website).ok();
    if let Some(company) = &user.company {
        write!(out, "\n    company  {}: \"{}\"", company.name, company.catch_phrase).ok();
    }
    out
}

pub fn error_view(failure: &Failure) -> String {
    format!("(!) Something went wrong\n    {}", failure.error)
}

pub fn print_pretty(view: &View) {
    match view {
        View::Card(user) => println!("{}\n", card(user)),
        View::Failed { error, .. } => println!("{}\n", error_view(error)),
    }
}

pub fn compact_table(views: &[View]) -> Table {
    let mut table = Table::new();
    table.set_format(*FORMAT_CLEAN);
    table.set_titles(row![b => "Id", "Name", "Username", "Email", "Phone", "Website"]);

    for view in views {
        let row = match view {
            View::Card(user) => row![
                user.id,
                user.name,
                format!("@{}", user.username),
                user.email,
                user.phone,
                user.website
            ],
            View::Failed { id, error } => {
                let mut row = Row::empty();
                row.add_cell(cell!(id));
                row.add_cell(cell!(Fr->format!("error: {}", error.error)));
                row
            }
        };
        table.add_row(row);
    }

    table
}

pub fn print_compact(views: &[View]) {
    compact_table(views).printstd();
}

pub fn print_json(views: &[View]) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(std::io::stdout(), views)?;
    println!();
    Ok(())
}

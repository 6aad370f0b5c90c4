//! Client directory and client profiles.

use kyc_console::{
    Permission,
    model::{Client, NewRelatedParty, Page, Pagination, RelatedParty},
    services::clients::ClientOverview,
};
use tracing::instrument;

use super::{
    Context,
    cases::case_table,
    changes::{change_table, format_timestamp},
    risk::assessment_table,
    terminal::{self, Colorize, Table, or_dash},
};

/// Browse the client directory
#[derive(Debug, clap::Parser)]
pub struct Clients {
    #[command(subcommand)]
    command: ClientsCommand,
}

#[derive(Debug, clap::Subcommand)]
enum ClientsCommand {
    /// List clients, optionally filtered by a search term
    List {
        /// Search by name or identifier
        #[arg(short, long, default_value = "")]
        query: String,

        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Rows per page (defaults to the configured page size)
        #[arg(long)]
        size: Option<u32>,
    },

    /// Show a client's profile, cases, risk and material changes
    Show {
        /// Client id
        id: i64,
    },

    /// Manage related parties
    #[command(subcommand)]
    RelatedParty(RelatedPartyCommand),

    /// Re-ingest a client from the source system
    Ingest {
        /// Client id
        id: i64,
    },
}

#[derive(Debug, clap::Subcommand)]
enum RelatedPartyCommand {
    /// Attach a director to a client
    Add {
        /// Client id
        client_id: i64,

        /// Given name
        #[arg(long)]
        first_name: String,

        /// Surname
        #[arg(long)]
        last_name: String,

        /// Relation to the client
        #[arg(long, default_value = "DIRECTOR")]
        relation: String,
    },

    /// Show one related party
    Show {
        /// Related party id
        id: i64,
    },
}

impl Clients {
    #[instrument(skip(ctx))]
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        match self.command {
            ClientsCommand::List { query, page, size } => {
                ctx.require(Permission::ViewClients).await?;
                let size = size.unwrap_or(ctx.config.page_size);
                let clients = ctx.api.clients().list(&query, page, size).await?;
                let pagination = Pagination::from_page(&clients, page, size);
                ctx.render(&clients, |clients| print_list(clients, &pagination))
            }
            ClientsCommand::Show { id } => {
                ctx.require(Permission::ViewClients).await?;
                let overview = ctx.api.clients().overview(id).await?;
                ctx.render(&overview, print_overview)
            }
            ClientsCommand::RelatedParty(RelatedPartyCommand::Add {
                client_id,
                first_name,
                last_name,
                relation,
            }) => {
                ctx.require(Permission::ManageClients).await?;
                if first_name.trim().is_empty() || last_name.trim().is_empty() {
                    anyhow::bail!("First and last name are required");
                }
                let party = NewRelatedParty {
                    relation_type: relation,
                    ..NewRelatedParty::director(first_name, last_name)
                };
                ctx.api.clients().add_related_party(client_id, &party).await?;
                println!("{}", "Related party added".success());

                let client = ctx.api.clients().get(client_id).await?;
                ctx.render(&client.related_parties, |parties| {
                    print_related_parties(parties);
                })
            }
            ClientsCommand::RelatedParty(RelatedPartyCommand::Show { id }) => {
                ctx.require(Permission::ViewClients).await?;
                let party = ctx.api.clients().related_party(id).await?;
                ctx.render(&party, print_related_party)
            }
            ClientsCommand::Ingest { id } => {
                ctx.require(Permission::ManageClients).await?;
                ctx.api.clients().ingest(id).await?;
                println!("{}", format!("Client {id} re-ingested").success());
                Ok(())
            }
        }
    }
}

fn print_list(clients: &Page<Client>, pagination: &Pagination) {
    client_table(&clients.content).print("No clients found.");
    let mut footer = pagination.summary();
    if pagination.has_next() {
        footer.push_str(&format!(" · next: --page {}", pagination.page + 1));
    }
    println!("{}", footer.dim());
}

pub fn client_table(clients: &[Client]) -> Table {
    let mut table = Table::new(vec!["ID", "Name", "Status", "Citizenship", "Onboarded"]);
    for client in clients {
        table.row(vec![
            client.client_id.to_string(),
            client.full_name(),
            client
                .status
                .as_deref()
                .map_or_else(|| "-".to_string(), terminal::status),
            or_dash(client.citizenship1.as_deref()),
            or_dash(client.onboarding_date),
        ]);
    }
    table
}

fn print_overview(overview: &ClientOverview) {
    let client = &overview.client;
    println!("{}", format!("{} (#{})", client.full_name(), client.client_id).info());
    let fields = [
        ("Status", client.status.clone()),
        ("Gender", client.gender.clone()),
        ("Date of birth", client.date_of_birth.map(|d| d.to_string())),
        ("Citizenship", client.citizenship1.clone()),
        ("Second citizenship", client.citizenship2.clone()),
        ("Country of tax", client.country_of_tax.clone()),
        ("Source of funds", client.source_of_funds_country.clone()),
        ("Occupation", client.occupation.clone()),
        ("Language", client.language.clone()),
        ("FATCA", client.fatca_status.clone()),
        ("CRS", client.crs_status.clone()),
        ("Onboarded", client.onboarding_date.map(|d| d.to_string())),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            println!("  {label:<20} {value}");
        }
    }

    section("Addresses");
    let mut addresses = Table::new(vec!["Type", "Address", "City", "Zip", "Country"]);
    for address in &client.addresses {
        let line = [&address.address_line1, &address.address_line2, &address.address_supplement]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .collect::<Vec<_>>()
            .join(", ");
        addresses.row(vec![
            or_dash(address.address_type.as_deref()),
            line,
            or_dash(address.city.as_deref()),
            or_dash(address.zip.as_deref()),
            or_dash(address.country.as_deref()),
        ]);
    }
    addresses.print("No addresses on file.");

    section("Identifiers");
    let mut identifiers = Table::new(vec!["Type", "Number", "Issued by"]);
    for identifier in &client.identifiers {
        identifiers.row(vec![
            or_dash(identifier.identifier_type.as_deref()),
            or_dash(identifier.number()),
            or_dash(identifier.issuing_authority.as_deref()),
        ]);
    }
    identifiers.print("No identifiers on file.");

    section("Related parties");
    print_related_parties(&client.related_parties);

    section("Risk");
    match overview.latest_risk() {
        Some(latest) => {
            println!(
                "  Latest: {} (score {})",
                terminal::status(latest.overall_risk_level.as_deref().unwrap_or("-")),
                or_dash(latest.overall_risk_score)
            );
            assessment_table(&overview.risk_history).print("");
        }
        None => println!("{}", "Not assessed yet.".dim()),
    }

    section("Cases");
    case_table(&overview.cases).print("No cases for this client.");

    section("Material changes");
    if let Some(when) = last_change(overview) {
        println!("  Last change {when}");
    }
    change_table(&overview.material_changes).print("No material changes recorded.");
}

fn print_related_parties(parties: &[RelatedParty]) {
    let mut table = Table::new(vec!["ID", "Name", "Relation", "Status"]);
    for party in parties {
        table.row(vec![
            or_dash(party.related_party_id),
            party.name(),
            or_dash(party.relation_type.as_deref()),
            or_dash(party.status.as_deref()),
        ]);
    }
    table.print("No related parties.");
}

fn print_related_party(party: &RelatedParty) {
    println!("{}", party.name().info());
    println!("  Relation       {}", or_dash(party.relation_type.as_deref()));
    println!("  Client         {}", or_dash(party.client_id));
    println!("  Date of birth  {}", or_dash(party.date_of_birth));
    println!("  Citizenship    {}", or_dash(party.citizenship1.as_deref()));
    println!("  Status         {}", or_dash(party.status.as_deref()));
}

fn section(title: &str) {
    println!();
    println!("{}", title.info());
}

fn last_change(overview: &ClientOverview) -> Option<String> {
    overview
        .material_changes
        .iter()
        .filter_map(|change| change.change_date.as_ref())
        .max()
        .map(format_timestamp)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn overview() -> ClientOverview {
        ClientOverview {
            client: serde_json::from_value(json!({
                "clientID": 42,
                "firstName": "Ada",
                "lastName": "Lovelace",
                "status": "ACTIVE",
            }))
            .unwrap(),
            cases: Vec::new(),
            risk_history: Vec::new(),
            material_changes: serde_json::from_value(json!([
                {"changeID": 1, "clientID": 42, "status": "PENDING", "category": "RISK",
                 "changeDate": "2024-01-02T08:00:00"},
                {"changeID": 2, "clientID": 42, "status": "PENDING", "category": "RISK",
                 "changeDate": "2024-03-04T17:45:00"},
            ]))
            .unwrap(),
        }
    }

    #[test]
    fn latest_change_is_the_newest_timestamp() {
        assert_eq!(last_change(&overview()).as_deref(), Some("2024-03-04 17:45"));
    }

    #[test]
    fn client_rows_use_full_name() {
        let lines = client_table(&[overview().client]).render(true);
        assert_eq!(lines[0], "ID: 42");
        assert_eq!(lines[1], "Name: Ada Lovelace");
        assert_eq!(lines[3], "Citizenship: -");
    }
}

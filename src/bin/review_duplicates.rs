use anyhow::{anyhow, Context, Result};
use chartmerge::db::Database;
use chartmerge::matching::normalizer::parse_calendar_date;
use chartmerge::matching::types::ClientFields;
use chartmerge::{check_for_duplicates, merge_clients, review};
use chrono::{DateTime, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use tokio::main;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new client, scan for duplicates and queue any matches
    Register {
        #[arg(short, long)]
        first_name: String,

        #[arg(short, long)]
        last_name: String,

        /// Date of birth (YYYY-MM-DD)
        #[arg(short, long)]
        date_of_birth: String,

        #[arg(short, long)]
        phone: String,

        #[arg(long)]
        street: Option<String>,

        #[arg(long)]
        zip: Option<String>,
    },

    /// Scan for duplicates without registering or persisting anything
    Scan {
        #[arg(short, long)]
        first_name: String,

        #[arg(short, long)]
        last_name: String,

        /// Date of birth (YYYY-MM-DD)
        #[arg(short, long)]
        date_of_birth: String,

        #[arg(short, long)]
        phone: String,

        #[arg(long)]
        street: Option<String>,

        #[arg(long)]
        zip: Option<String>,

        /// Client id to exclude when re-checking an existing client
        #[arg(short, long)]
        exclude: Option<String>,
    },

    /// List the pending review queue, strongest matches first
    List,

    /// Dismiss a pending pair as not being the same person
    Dismiss {
        /// Pending duplicate id
        #[arg(short, long)]
        id: String,

        /// Reviewer id for the audit trail
        #[arg(short, long, default_value = "cli-user")]
        reviewer: String,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Merge the source client into the target client
    Merge {
        #[arg(short, long)]
        source: String,

        #[arg(short, long)]
        target: String,

        /// Reviewer id for the audit trail
        #[arg(short, long, default_value = "cli-user")]
        reviewer: String,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Display review queue statistics
    Stats,
}

fn parse_dob(date_of_birth: &str) -> Result<DateTime<Utc>> {
    let date = parse_calendar_date(date_of_birth)
        .ok_or_else(|| anyhow!("Unrecognized date of birth: {}", date_of_birth))?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

fn print_candidates(matches: &[chartmerge::matching::types::MatchCandidate]) {
    if matches.is_empty() {
        println!("No potential duplicates found");
        return;
    }

    println!("Found {} potential duplicate(s):", matches.len());
    for candidate in matches {
        let client = &candidate.matched_client;
        println!(
            "  {:.2}  {:12}  {} {} (dob {}, phone {}) [{}]",
            candidate.confidence,
            candidate.match_type.to_string(),
            client.first_name,
            client.last_name,
            client.date_of_birth,
            client.primary_phone,
            candidate.client_id,
        );
    }
}

#[main]
async fn main() -> Result<()> {
    // Initialize tracing
    chartmerge::logging::configure_logging();

    let cli = Cli::parse();

    // Get database connection
    let database_url =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "chartmerge.db".to_string());
    let db = Database::new(&database_url)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Register {
            first_name,
            last_name,
            date_of_birth,
            phone,
            street,
            zip,
        } => {
            let fields = ClientFields {
                first_name,
                last_name,
                date_of_birth: parse_dob(&date_of_birth)?,
                primary_phone: phone,
                address_street1: street,
                address_zip_code: zip,
            };

            let client_id = db.add_client(&fields).await?;
            println!("Registered client {}", client_id);

            let matches = check_for_duplicates(&db, &fields, Some(&client_id)).await?;
            print_candidates(&matches);

            let inserted = review::save_potential_duplicates(&db, &client_id, &matches).await?;
            if inserted > 0 {
                println!("{} pair(s) queued for review", inserted);
            }
        }

        Commands::Scan {
            first_name,
            last_name,
            date_of_birth,
            phone,
            street,
            zip,
            exclude,
        } => {
            let fields = ClientFields {
                first_name,
                last_name,
                date_of_birth: parse_dob(&date_of_birth)?,
                primary_phone: phone,
                address_street1: street,
                address_zip_code: zip,
            };

            let matches = check_for_duplicates(&db, &fields, exclude.as_deref()).await?;
            print_candidates(&matches);
        }

        Commands::List => {
            let queue = review::get_pending_duplicates(&db).await?;
            if queue.is_empty() {
                println!("Review queue is empty");
            }

            for duplicate in &queue {
                println!(
                    "{}  {:.2}  {:12}  ({}, {})",
                    duplicate.id,
                    duplicate.confidence_score,
                    duplicate.match_type.to_string(),
                    duplicate.client1_id,
                    duplicate.client2_id,
                );
                for client in [&duplicate.client1, &duplicate.client2].into_iter().flatten() {
                    println!(
                        "    {} {} (dob {}, phone {})",
                        client.first_name,
                        client.last_name,
                        client.date_of_birth,
                        client.primary_phone,
                    );
                }
            }
        }

        Commands::Dismiss { id, reviewer, notes } => {
            info!("Dismissing potential duplicate {}", id);
            review::dismiss_duplicate(&db, &id, &reviewer, notes.as_deref()).await?;
            println!("Dismissed {}", id);
        }

        Commands::Merge {
            source,
            target,
            reviewer,
            notes,
        } => {
            info!("Merging client {} into {}", source, target);
            let outcome = merge_clients(&db, &source, &target, &reviewer, notes.as_deref()).await?;
            println!(
                "Merged {} into {}: {} records relocated, {} pending duplicates resolved",
                source, target, outcome.records_relocated, outcome.duplicates_resolved
            );
        }

        Commands::Stats => {
            let stats = review::duplicate_stats(&db).await?;
            println!("Potential duplicates: {} total", stats.total);
            println!("  Pending:   {}", stats.pending);
            println!("  Merged:    {}", stats.merged);
            println!("  Dismissed: {}", stats.dismissed);

            if !stats.pending_by_match_type.is_empty() {
                println!("Pending by match type:");
                for (match_type, count) in &stats.pending_by_match_type {
                    println!("  {:12} {}", match_type, count);
                }
            }
        }
    }

    Ok(())
}

//! encore-vote - command-line voting client
//!
//! Talks to a running encore-ls. Votes as the user given by `--user`, or as
//! the anonymous identity stored under the root folder.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use encore_common::config::{resolve_root_folder, EncoreConfig, ROOT_FOLDER_ENV};
use encore_vc::feed::VoteActivity;
use encore_vc::{identity, FeedConfig, HttpLedger, VoteLedger, VoteOutcome, VoterIdentity, VotingSession};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "encore-vote")]
#[command(about = "Vote on setlists served by encore-ls")]
#[command(version)]
struct Args {
    /// Ledger service URL (overrides config.toml)
    #[arg(short, long, env = "ENCORE_SERVER_URL")]
    server: Option<String>,

    /// Authenticated user id; anonymous when omitted
    #[arg(short, long, env = "ENCORE_USER")]
    user: Option<String>,

    /// Display name shown to other fans
    #[arg(short, long)]
    name: Option<String>,

    /// Root folder holding the anonymous identity
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print current vote counts of a setlist
    Show { setlist_id: Uuid },

    /// Vote for one song slot
    Vote {
        show_id: Uuid,
        setlist_id: Uuid,
        song_slot_id: Uuid,
    },

    /// Follow live votes until Ctrl-C
    Watch { show_id: Uuid, setlist_id: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore_vc=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "encore-vote v{} [{}] built {}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let args = Args::parse();
    let config = EncoreConfig::load();
    let server = args.server.clone().unwrap_or_else(|| config.server_url.clone());
    let ledger = HttpLedger::new(&server).context("Failed to create ledger client")?;

    match args.command {
        Command::Show { setlist_id } => {
            let counts = ledger
                .vote_counts(setlist_id)
                .await
                .with_context(|| format!("Failed to read counts from {}", server))?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        Command::Vote {
            show_id,
            setlist_id,
            song_slot_id,
        } => {
            let voter = voter_identity(&args.user, &args.name, args.root_folder.as_deref(), &config)?;
            let session = VotingSession::open(Arc::new(ledger), Some(voter), show_id, setlist_id).await;
            let result = session.vote(song_slot_id).await;
            println!("{}", serde_json::to_string(&VoteOutcome::from_result(song_slot_id, &result))?);
            println!("{}", serde_json::to_string(&session.quota())?);
        }
        Command::Watch { show_id, setlist_id } => {
            let voter = voter_identity(&args.user, &args.name, args.root_folder.as_deref(), &config)?;
            let connector = Arc::new(ledger.feed_connector());
            let session = VotingSession::open(Arc::new(ledger), Some(voter), show_id, setlist_id)
                .await
                .with_feed_config(FeedConfig::from(&config));

            session.attach_feed(
                connector,
                Some(Arc::new(|activity: &VoteActivity| {
                    println!("{} voted for {}", activity.voter_name, activity.song_name);
                })),
            );

            let Some(mut state) = session.watch_state() else {
                anyhow::bail!("Feed did not start");
            };
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = state.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let current = *state.borrow_and_update();
                        eprintln!("feed: {}", current);
                    }
                }
            }
            session.close();
            println!("{}", serde_json::to_string_pretty(&session.vote_counts())?);
        }
    }

    Ok(())
}

fn voter_identity(
    user: &Option<String>,
    name: &Option<String>,
    root_folder: Option<&std::path::Path>,
    config: &EncoreConfig,
) -> Result<VoterIdentity> {
    if let Some(user) = user {
        return Ok(VoterIdentity::authenticated(user.clone(), name.clone()));
    }

    let root = resolve_root_folder(root_folder, ROOT_FOLDER_ENV, config);
    let mut voter = identity::load_or_create_anonymous(&root)
        .with_context(|| format!("Failed to load anonymous identity from {}", root.display()))?;
    voter.display_name = name.clone();
    Ok(voter)
}

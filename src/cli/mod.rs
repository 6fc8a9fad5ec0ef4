//! Command-line interface for holoreg.
//!
//! Provides commands for registering and publishing content, transferring
//! rights, and inspecting the registry.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::{self, ResolvedConfig};
use crate::core::{ContentFilter, RegistryError, RegistryService, Reply};
use crate::domain::{ContentId, ContentRecord, NewContent, Principal, RightsRecord, RightsTransfer};

/// holoreg - Content registry and rights ledger
#[derive(Parser, Debug)]
#[command(name = "holoreg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Principal to act as (overrides the configured default)
    #[arg(long = "as", global = true, env = "HOLOREG_PRINCIPAL")]
    pub principal: Option<Principal>,

    /// Print results as {"ok": ...} / {"error": code} JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register new content (you become creator and rights owner)
    Create {
        /// Content title
        #[arg(short, long)]
        title: String,

        /// Free-text description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Content-addressing token
        #[arg(long)]
        hash: String,

        /// Content type (performance, video, audio, text, or a configured extension)
        #[arg(short = 'k', long = "type")]
        content_type: String,

        /// Duration (unit-agnostic)
        #[arg(long, default_value = "0")]
        duration: u64,
    },

    /// Publish content (creator only)
    Publish {
        /// Content ID
        content_id: ContentId,
    },

    /// Replace the rights on a content item (current owner only)
    Transfer {
        /// Content ID
        content_id: ContentId,

        /// New rights owner
        #[arg(long)]
        to: Principal,

        /// License type (exclusive, non-exclusive, or a configured extension)
        #[arg(short, long, default_value = "exclusive")]
        license: String,

        /// Royalty percentage (0-100)
        #[arg(short, long, default_value = "0")]
        royalty: u32,

        /// Expiration timestamp (RFC 3339); omit for no expiration
        #[arg(short, long)]
        expires: Option<DateTime<Utc>>,
    },

    /// Show a content record
    Show {
        /// Content ID
        content_id: ContentId,
    },

    /// Show the rights on a content item
    Rights {
        /// Content ID
        content_id: ContentId,
    },

    /// List registered content
    List {
        /// Filter by content type
        #[arg(short = 'k', long = "type")]
        content_type: Option<String>,

        /// Only published content
        #[arg(long, conflicts_with = "unpublished")]
        published: bool,

        /// Only unpublished content
        #[arg(long)]
        unpublished: bool,

        /// Filter by creator
        #[arg(long)]
        creator: Option<Principal>,

        /// Maximum number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = config::config()?;

        if let Commands::Config = self.command {
            show_config(config);
            return Ok(());
        }

        let service = RegistryService::open(config).await?;
        let json = self.json;

        match self.command {
            Commands::Create {
                title,
                description,
                hash,
                content_type,
                duration,
            } => {
                let caller = resolve_principal(self.principal, config)?;
                let input = NewContent::new(title, description, hash, content_type, duration);
                let result = service.create_content(&caller, input).await;
                emit(json, result, |id| println!("Created content {}", id))
            }
            Commands::Publish { content_id } => {
                let caller = resolve_principal(self.principal, config)?;
                let result = service.publish_content(&caller, content_id).await;
                emit(json, result.map(|_| true), |_| {
                    println!("Content {} is published", content_id)
                })
            }
            Commands::Transfer {
                content_id,
                to,
                license,
                royalty,
                expires,
            } => {
                let caller = resolve_principal(self.principal, config)?;
                let transfer = RightsTransfer::new(to, license, royalty, expires);
                let result = service.transfer_rights(&caller, content_id, transfer).await;
                emit(json, result.map(|_| true), |_| {
                    println!("Rights for content {} transferred", content_id)
                })
            }
            Commands::Show { content_id } => {
                let result = service.get_content(content_id).await;
                emit(json, result, print_content)
            }
            Commands::Rights { content_id } => {
                let result = service.get_content_rights(content_id).await;
                emit(json, result, print_rights)
            }
            Commands::List {
                content_type,
                published,
                unpublished,
                creator,
                limit,
            } => {
                let mut filter = ContentFilter::new().with_limit(limit);
                if let Some(t) = content_type {
                    filter = filter.with_content_type(t);
                }
                if published || unpublished {
                    filter = filter.with_published(published);
                }
                if let Some(c) = creator {
                    filter = filter.with_creator(c);
                }

                let result = service.list_content(&filter).await;
                emit(json, result, |records| print_list(records))
            }
            Commands::Config => Ok(()),
        }
    }
}

/// Pick the caller identity: --as flag, then config
fn resolve_principal(flag: Option<Principal>, config: &ResolvedConfig) -> Result<Principal> {
    if let Some(principal) = flag {
        return Ok(principal);
    }

    let configured = config
        .principal
        .clone()
        .context("No principal given. Use --as <id>, HOLOREG_PRINCIPAL, or `principal:` in config")?;

    Principal::new(configured).map_err(anyhow::Error::msg)
}

/// Print a result either as a tagged JSON reply or in human form.
///
/// In JSON mode failures are reported through the `error` tag and the
/// command itself succeeds.
fn emit<T, F>(json: bool, result: Result<T, RegistryError>, human: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T),
{
    if json {
        let reply: Reply<T> = result.into();
        println!("{}", serde_json::to_string_pretty(&reply)?);
        return Ok(());
    }

    let value = result?;
    human(&value);
    Ok(())
}

fn print_content(record: &ContentRecord) {
    println!("Content ID: {}", record.content_id);
    println!("Title: {}", record.title);
    println!("Creator: {}", record.creator);
    println!("Type: {}", record.content_type);
    println!("Duration: {}", record.duration);
    println!("Hash: {}", record.content_hash);
    println!("Created: {}", record.creation_timestamp);
    println!("Published: {}", if record.is_published { "yes" } else { "no" });
    if !record.description.is_empty() {
        println!("\n{}", record.description);
    }
}

fn print_rights(rights: &RightsRecord) {
    println!("Content ID: {}", rights.content_id);
    println!("Owner: {}", rights.owner);
    println!("License: {}", rights.license_type);
    println!("Royalty: {}", rights.royalty_percentage);
    match rights.expiration_date {
        Some(expires) if rights.is_expired(Utc::now()) => println!("Expires: {} (expired)", expires),
        Some(expires) => println!("Expires: {}", expires),
        None => println!("Expires: never"),
    }
}

fn print_list(records: &[ContentRecord]) {
    if records.is_empty() {
        println!("No content found");
        return;
    }

    println!(
        "{:<8} {:<32} {:<14} {:<20} {:<9}",
        "ID", "TITLE", "TYPE", "CREATOR", "PUBLISHED"
    );
    println!("{}", "-".repeat(87));

    for record in records {
        let title = if record.title.chars().count() > 30 {
            format!("{}...", record.title.chars().take(27).collect::<String>())
        } else {
            record.title.clone()
        };
        println!(
            "{:<8} {:<32} {:<14} {:<20} {:<9}",
            record.content_id,
            title,
            record.content_type,
            record.creator,
            if record.is_published { "yes" } else { "no" }
        );
    }
}

/// Show resolved configuration
fn show_config(config: &ResolvedConfig) {
    println!("Home: {}", config.home.display());
    println!("Backend: {}", config.backend);
    println!(
        "Principal: {}",
        config.principal.as_deref().unwrap_or("(not set)")
    );
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_transfer() {
        let cli = Cli::try_parse_from([
            "holoreg", "--as", "alice", "transfer", "1", "--to", "bob", "--license",
            "non-exclusive", "--royalty", "10",
        ])
        .unwrap();

        assert_eq!(cli.principal.unwrap().as_str(), "alice");
        match cli.command {
            Commands::Transfer {
                content_id,
                to,
                royalty,
                expires,
                ..
            } => {
                assert_eq!(content_id, ContentId::FIRST);
                assert_eq!(to.as_str(), "bob");
                assert_eq!(royalty, 10);
                assert!(expires.is_none());
            }
            other => panic!("Expected transfer, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_zero_id() {
        assert!(Cli::try_parse_from(["holoreg", "show", "0"]).is_err());
    }

    #[test]
    fn test_principal_fallback_to_config() {
        let mut config = ResolvedConfig::with_home("/tmp/holoreg-test");
        assert!(resolve_principal(None, &config).is_err());

        config.principal = Some("studio".to_string());
        assert_eq!(resolve_principal(None, &config).unwrap().as_str(), "studio");

        let flag = Principal::new("alice").unwrap();
        assert_eq!(
            resolve_principal(Some(flag), &config).unwrap().as_str(),
            "alice"
        );
    }
}

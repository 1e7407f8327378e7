use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use metadata_store::{
    config::{Config, ObservabilityConfig},
    state::create_store,
    ConstraintGroup, MetadataService, PageRequest, SortField, SortOrder,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "metadata-cli", version)]
#[command(about = "Attach typed metadata to owners and search it", long_about = None)]
struct Cli {
    /// Configuration file layered over the built-in defaults (else $METADATA_CONFIG)
    #[arg(short, long)]
    config: Option<String>,

    /// Tenant URN, e.g. urn:tenant:uuid:<uuid>
    #[arg(short, long, env = "METADATA_TENANT")]
    tenant: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OwnerArgs {
    /// Owner type
    #[arg(short = 'T', long = "type")]
    owner_type: String,

    /// Owner URN, e.g. urn:thing:uuid:<uuid>
    #[arg(short, long)]
    owner: String,
}

#[derive(Args)]
struct PageArgs {
    #[arg(short, long, default_value = "1")]
    page: u32,

    /// Defaults to search.default_page_size
    #[arg(short, long)]
    size: Option<u32>,

    /// ownerType, ownerId or keyName
    #[arg(long)]
    sort: Option<SortField>,

    #[arg(long, default_value = "asc")]
    order: SortOrder,
}

impl PageArgs {
    fn request(&self, default_size: u32) -> PageRequest {
        let request = PageRequest::new(self.page, self.size.unwrap_or(default_size));
        match self.sort {
            Some(field) => request.sorted_by(field, self.order),
            None => request,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write key=value pairs (values are read as JSON, falling back to strings)
    Set {
        #[command(flatten)]
        owner: OwnerArgs,

        /// Fail if any key already exists instead of replacing it
        #[arg(long)]
        create: bool,

        #[arg(value_name = "KEY=VALUE", required = true, value_parser = parse_pair)]
        pairs: Vec<(String, Value)>,
    },

    /// Read one key
    Get {
        #[command(flatten)]
        owner: OwnerArgs,

        key: String,
    },

    /// Read all keys of an owner, or only the given ones
    Owner {
        #[command(flatten)]
        owner: OwnerArgs,

        #[arg(short, long = "key")]
        keys: Vec<String>,
    },

    /// Delete one key
    Delete {
        #[command(flatten)]
        owner: OwnerArgs,

        key: String,
    },

    /// Delete every key of an owner
    DeleteOwner {
        #[command(flatten)]
        owner: OwnerArgs,
    },

    /// Find owners satisfying every constraint group
    Search {
        /// Restrict to one owner type
        #[arg(short = 'T', long = "type")]
        owner_type: Option<String>,

        /// key=K,type=T,value=V (any subset); repeat for more groups
        #[arg(short, long = "group")]
        groups: Vec<ConstraintGroup>,

        #[command(flatten)]
        paging: PageArgs,
    },

    /// Count owners satisfying every constraint group
    Count {
        #[arg(short = 'T', long = "type")]
        owner_type: Option<String>,

        #[arg(short, long = "group")]
        groups: Vec<ConstraintGroup>,
    },

    /// Find owners holding every key=value pair; no pairs lists every owner
    Match {
        #[arg(value_name = "KEY=VALUE", value_parser = parse_pair)]
        pairs: Vec<(String, Value)>,

        #[command(flatten)]
        paging: PageArgs,
    },

    /// List attribute rows of the tenant
    List {
        #[arg(short, long, default_value = "1")]
        page: u32,

        #[arg(short, long)]
        size: Option<u32>,
    },
}

fn parse_pair(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("metadata_store={}", observability.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(Some(path)),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    init_tracing(&config.observability);

    tracing::debug!(backend = ?config.state.backend, "Opening attribute store");
    let store = create_store(&config.state).await?;
    let default_size = config.search.default_page_size;
    let service = MetadataService::new(store, config.search);
    let tenant = cli.tenant.as_str();

    match cli.command {
        Commands::Set {
            owner,
            create,
            pairs,
        } => {
            let metadata: BTreeMap<String, Value> = pairs.into_iter().collect();
            let written = if create {
                service
                    .create(tenant, &owner.owner_type, &owner.owner, &metadata)
                    .await?
            } else {
                service
                    .upsert(tenant, &owner.owner_type, &owner.owner, &metadata)
                    .await?
            };
            print_json(&written)?;
        }

        Commands::Get { owner, key } => {
            let value = service
                .find_by_key(tenant, &owner.owner_type, &owner.owner, &key)
                .await?;
            print_json(&value)?;
        }

        Commands::Owner { owner, keys } => {
            let found = service
                .find_by_owner(tenant, &owner.owner_type, &owner.owner, &keys)
                .await?;
            print_json(&found)?;
        }

        Commands::Delete { owner, key } => {
            let removed = service
                .delete(tenant, &owner.owner_type, &owner.owner, &key)
                .await?;
            print_json(&removed)?;
        }

        Commands::DeleteOwner { owner } => {
            let removed = service
                .delete_all_by_owner(tenant, &owner.owner_type, &owner.owner)
                .await?;
            print_json(&removed)?;
        }

        Commands::Search {
            owner_type,
            groups,
            paging,
        } => {
            let page = service
                .search(tenant, owner_type.as_deref(), &groups, &paging.request(default_size))
                .await?;
            print_json(&page)?;
        }

        Commands::Count { owner_type, groups } => {
            let count = service.count(tenant, owner_type.as_deref(), &groups).await?;
            print_json(&serde_json::json!({ "count": count }))?;
        }

        Commands::Match { pairs, paging } => {
            let pairs: BTreeMap<String, Value> = pairs.into_iter().collect();
            let page = service
                .find_owners_by_key_value_pairs(tenant, &pairs, &paging.request(default_size))
                .await?;
            print_json(&page)?;
        }

        Commands::List { page, size } => {
            let rows = service
                .find_all(tenant, page, size.unwrap_or(default_size))
                .await?;
            print_json(&rows)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair_reads_json_then_string() {
        assert_eq!(parse_pair("n=3").unwrap(), ("n".to_string(), serde_json::json!(3)));
        assert_eq!(parse_pair("flag=true").unwrap().1, Value::Bool(true));
        assert_eq!(parse_pair("name=red").unwrap().1, Value::String("red".to_string()));
        assert!(parse_pair("novalue").is_err());
    }

    #[test]
    fn test_cli_parses_groups_and_sort() {
        let cli = Cli::try_parse_from([
            "metadata-cli",
            "--tenant",
            "urn:tenant:uuid:00000000-0000-0000-0000-000000000001",
            "search",
            "--group",
            "key=color,value=red",
            "--group",
            "type=boolean",
            "--sort",
            "ownerType",
            "--order",
            "desc",
        ])
        .unwrap();

        match cli.command {
            Commands::Search { groups, paging, .. } => {
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0].key.as_deref(), Some("color"));
                let request = paging.request(20);
                assert_eq!(request.size, 20);
                assert_eq!(request.sort.unwrap().order, SortOrder::Descending);
            }
            _ => panic!("expected search command"),
        }
    }
}

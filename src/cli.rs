use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "salvage")]
#[command(about = "Recover structured content blocks from malformed HTML")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract content blocks from an HTML file and print them as JSON
    Extract {
        file: PathBuf,
        /// Structure metadata as inline JSON, or `@path` to a JSON file
        #[arg(long, value_name = "JSON")]
        metadata: Option<String>,
        /// Cache key source (defaults to the file stem)
        #[arg(long, value_name = "NAME")]
        source_name: Option<String>,
        /// Neither read nor write the metadata cache
        #[arg(long)]
        no_cache: bool,
        #[arg(long)]
        pretty: bool,
    },
    /// Show what the structure analyzer would be given for an HTML file
    Preprocess {
        file: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
    /// Inspect or prune the metadata cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// List cached entries
    List,
    /// Remove every cached entry
    Clear,
    /// Remove one cached entry
    Delete { key: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_extract_arguments() {
        let cli = Cli::parse_from(["salvage", "extract", "page.html", "--metadata", "@meta.json", "--no-cache"]);
        let Command::Extract {
            file,
            metadata,
            source_name,
            no_cache,
            pretty,
        } = cli.command
        else {
            panic!("expected extract");
        };
        assert_eq!(file, PathBuf::from("page.html"));
        assert_eq!(metadata.as_deref(), Some("@meta.json"));
        assert!(source_name.is_none());
        assert!(no_cache);
        assert!(!pretty);
    }

    #[test]
    fn test_cache_delete() {
        let cli = Cli::parse_from(["salvage", "cache", "delete", "page"]);
        assert!(matches!(
            cli.command,
            Command::Cache { command: CacheCommand::Delete { key } } if key == "page"
        ));
    }
}

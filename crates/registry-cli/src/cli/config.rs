use std::{fs, path::Path};

use clap::Parser;
use registry_core::{Config, DirectoryStore};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Init {}

impl Init {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config_path = root.join("config.toml");
        if config_path.exists() {
            anyhow::bail!(
                "Store already initialized (found existing {})",
                config_path.display()
            );
        }

        fs::create_dir_all(root)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", root.display()))?;
        let store = DirectoryStore::open(root)?;
        Config::default()
            .save(&store.config_path())
            .map_err(|e| anyhow::anyhow!("Failed to create config.toml: {e}"))?;

        println!("Initialized registry store in {}", root.display());
        println!("  Created: config.toml");
        println!("  Created: registries/");
        println!();
        println!("Next steps:");
        println!("  reg import rows.json --owner <USER>");

        Ok(())
    }
}

#[derive(Debug, Parser)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Set a configuration flag
    Set {
        /// Configuration key to set
        key: String,

        /// Value to set
        value: String,
    },

    /// Require an attribute on every imported row
    Require {
        /// Attribute name
        attribute: String,
    },

    /// Declare a known attribute
    Declare {
        /// Attribute name
        attribute: String,

        /// Human-readable description
        #[arg(long, short)]
        description: Option<String>,
    },
}

impl ConfigCommand {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let store = DirectoryStore::open(root)?;
        let config_path = store.config_path();
        let mut config = store.load_config().map_err(|e| anyhow::anyhow!("{e}"))?;

        match self {
            Self::Show => {
                println!("Configuration:");
                println!("  prefix: {}", config.prefix());
                println!("  digits: {}", config.digits());
                println!("  allow_unknown_attributes: {}", config.allow_unknown_attributes);
                println!("  skip_noop_updates: {}", config.skip_noop_updates);
                if !config.required_attributes().is_empty() {
                    println!("  required_attributes: {:?}", config.required_attributes());
                }
                if !config.known_attributes().is_empty() {
                    println!("  known_attributes:");
                    for name in config.known_attributes() {
                        match config
                            .metadata_for_attribute(name)
                            .and_then(|m| m.description.as_deref())
                        {
                            Some(description) => println!("    {name} {}", description.dim()),
                            None => println!("    {name}"),
                        }
                    }
                }
                return Ok(());
            }
            Self::Set { key, value } => {
                let flag = value
                    .parse::<bool>()
                    .map_err(|_| anyhow::anyhow!("Value must be 'true' or 'false'"))?;
                match key.as_str() {
                    "allow_unknown_attributes" => config.allow_unknown_attributes = flag,
                    "skip_noop_updates" => config.skip_noop_updates = flag,
                    _ => {
                        return Err(anyhow::anyhow!(
                            "Unknown configuration key: '{key}'\nSupported keys: \
                             allow_unknown_attributes, skip_noop_updates",
                        ));
                    }
                }
                println!("{}", format!("{key} = {flag}").success());
            }
            Self::Require { attribute } => {
                if config.require_attribute(&attribute) {
                    println!("{}", format!("Rows must now carry '{attribute}'").success());
                } else {
                    println!("'{attribute}' is already required");
                }
            }
            Self::Declare {
                attribute,
                description,
            } => {
                let added = config.declare_attribute(&attribute);
                config.set_attribute_description(&attribute, description);
                if added {
                    println!("{}", format!("Declared '{attribute}'").success());
                } else {
                    println!("Updated '{attribute}'");
                }
                if config.allow_unknown_attributes {
                    println!(
                        "{}",
                        "Undeclared attributes stay allowed until allow_unknown_attributes is false"
                            .dim()
                    );
                }
            }
        }

        config
            .save(&config_path)
            .map_err(|e| anyhow::anyhow!("{e}"))
    }
}

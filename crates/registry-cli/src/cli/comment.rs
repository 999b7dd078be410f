use std::path::Path;

use clap::{Parser, ValueEnum};
use registry_core::{Comment, CommentLevel, CommentQuery, CommentTarget, RequirementId};
use serde_json::json;
use tracing::instrument;

use super::{list::OutputFormat, open, parse_requirement_id, resolve_registry, terminal::Colorize};

/// Comment granularity as typed on the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Level {
    /// The registry as a whole
    Document,
    /// One requirement
    Row,
    /// One attribute of one requirement
    Cell,
}

impl From<Level> for CommentLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Document => Self::Document,
            Level::Row => Self::Row,
            Level::Cell => Self::Cell,
        }
    }
}

#[derive(Debug, Parser)]
pub enum CommentCommand {
    /// Add a comment to a registry, requirement, or attribute
    Add {
        /// Registry id or name
        registry: String,

        /// The comment text
        text: String,

        /// Who is commenting
        #[arg(long, short)]
        author: String,

        /// Granularity (defaults to row when a requirement is given, cell when
        /// an attribute is given too, document otherwise)
        #[arg(long, value_enum)]
        level: Option<Level>,

        /// Requirement the comment is about
        #[arg(long, value_parser = parse_requirement_id)]
        requirement: Option<RequirementId>,

        /// Attribute the comment is about
        #[arg(long)]
        attribute: Option<String>,
    },

    /// List comments, oldest first
    List {
        /// Only comments in this registry (id or name)
        #[arg(long)]
        registry: Option<String>,

        /// Only comments on this requirement
        #[arg(long, value_parser = parse_requirement_id)]
        requirement: Option<RequirementId>,

        /// Only comments of this level
        #[arg(long, value_enum)]
        level: Option<Level>,

        /// Output format (default: table).
        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },
}

/// The level implied by which parts were given.
const fn infer_level(requirement: bool, attribute: bool) -> Level {
    match (requirement, attribute) {
        (true, true) => Level::Cell,
        (true, false) => Level::Row,
        (false, _) => Level::Document,
    }
}

impl CommentCommand {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        match self {
            Self::Add {
                registry,
                text,
                author,
                level,
                requirement,
                attribute,
            } => {
                let mut workflow = open(root)?;
                let id = resolve_registry(&workflow, &registry)?;
                let level = level
                    .unwrap_or_else(|| infer_level(requirement.is_some(), attribute.is_some()));
                let target = CommentTarget::from_parts(level.into(), id, requirement, attribute)?;
                let comment = workflow.add_comment(target, &author, &text)?;
                println!(
                    "{}",
                    format!("Added {} comment", comment.level()).success()
                );
                Ok(())
            }
            Self::List {
                registry,
                requirement,
                level,
                output,
            } => {
                let workflow = open(root)?;
                let registry = registry
                    .map(|key| resolve_registry(&workflow, &key))
                    .transpose()?;
                let comments = workflow.list_comments(&CommentQuery {
                    level: level.map(Into::into),
                    registry,
                    requirement,
                })?;
                let digits = workflow.config().digits();

                match output {
                    OutputFormat::Json => {
                        let out: Vec<_> = comments
                            .iter()
                            .map(|c| comment_json(c, digits))
                            .collect();
                        println!("{}", serde_json::to_string_pretty(&out)?);
                    }
                    OutputFormat::Table if comments.is_empty() => println!("No comments"),
                    OutputFormat::Table => {
                        for comment in &comments {
                            print_comment(comment, digits);
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

fn subject(comment: &Comment, digits: usize) -> String {
    let target = comment.target();
    match (target.requirement(), target.attribute()) {
        (Some(requirement), Some(attribute)) => {
            format!("{}.{attribute}", requirement.display(digits))
        }
        (Some(requirement), None) => requirement.display(digits).to_string(),
        (None, _) => "registry".to_string(),
    }
}

fn comment_json(comment: &Comment, digits: usize) -> serde_json::Value {
    let target = comment.target();
    json!({
        "id": comment.id().to_string(),
        "level": comment.level().as_str(),
        "registry": target.registry().to_string(),
        "requirement": target.requirement().map(|r| r.display(digits).to_string()),
        "attribute": target.attribute(),
        "author": comment.author(),
        "text": comment.text(),
        "created_at": comment.created_at().to_rfc3339(),
    })
}

fn print_comment(comment: &Comment, digits: usize) {
    println!(
        "{} {} {}",
        comment
            .created_at()
            .format("%Y-%m-%d %H:%M")
            .to_string()
            .dim(),
        comment.author().info(),
        format!("on {}", subject(comment, digits)).dim()
    );
    for line in comment.text().lines() {
        println!("    {line}");
    }
}

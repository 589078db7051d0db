use crate::config::toml_config::{AppConfig, LogFormat};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "course-registry")]
#[command(about = "Student course registration backend")]
pub struct CliConfig {
    #[arg(long, help = "Path to a TOML config file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "SQLite database path (overrides the config file)")]
    pub database: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create the database schema and exit
    Init,

    /// Create a student account
    AddStudent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, help = "Credential hash produced by the identity provider")]
        credential_hash: String,
        #[arg(long)]
        phone: Option<String>,
    },

    /// Create a course
    AddCourse {
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, help = "Seats in the course (1-100, default 3)")]
        max_students: Option<u32>,
        #[arg(long)]
        professor_id: Option<i64>,
    },

    /// Register a student for a course
    Enroll {
        #[arg(long = "as", help = "Authenticated student id")]
        caller: i64,
        #[arg(long)]
        student: i64,
        #[arg(long)]
        course: i64,
    },

    /// Withdraw a student from a course
    Unregister {
        #[arg(long = "as", help = "Authenticated student id")]
        caller: i64,
        #[arg(long)]
        student: i64,
        #[arg(long)]
        course: i64,
    },

    /// List the caller's courses
    Courses {
        #[arg(long = "as", help = "Authenticated student id")]
        caller: i64,
    },

    /// List the students registered for a course
    Roster {
        #[arg(long)]
        course: i64,
    },

    DeleteStudent {
        #[arg(long)]
        id: i64,
    },

    DeleteCourse {
        #[arg(long)]
        id: i64,
    },
}

impl CliConfig {
    /// Loads the config file (or defaults) and applies command-line overrides.
    pub fn resolve(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };

        if let Some(database) = &self.database {
            config.database.path = database.clone();
        }
        if self.verbose {
            config.logging.verbose = true;
        }
        if self.json_logs {
            config.logging.format = LogFormat::Json;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enroll_command() {
        let cli = CliConfig::try_parse_from([
            "course-registry",
            "--database",
            ":memory:",
            "enroll",
            "--as",
            "4",
            "--student",
            "4",
            "--course",
            "9",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Command::Enroll {
                caller: 4,
                student: 4,
                course: 9
            }
        ));
        let config = cli.resolve().unwrap();
        assert!(config.is_in_memory());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli =
            CliConfig::try_parse_from(["course-registry", "--verbose", "--json-logs", "init"])
                .unwrap();
        let config = cli.resolve().unwrap();

        assert!(config.logging.verbose);
        assert_eq!(config.logging.format, LogFormat::Json);
    }
}

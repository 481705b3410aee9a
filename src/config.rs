use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub imap: ImapConfig,
    pub search: SearchConfig,
    pub data_dir: String,
    pub output: OutputDirs,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImapConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Only mails from this address are fetched
    pub sender: String,
    pub start_date: NaiveDate,
    /// Exclusive upper bound; tomorrow when unset
    pub end_date: Option<NaiveDate>,
}

impl SearchConfig {
    /// Effective `BEFORE` date for a run starting now
    pub fn end_date_or_tomorrow(&self) -> NaiveDate {
        self.end_date.unwrap_or_else(|| {
            let today = Local::now().date_naive();
            today.checked_add_days(Days::new(1)).unwrap_or(today)
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub schedule_times: Vec<String>, // Format: "HH:MM" (e.g., ["02:00", "14:00"])
}

/// Where each category lands on disk
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct OutputDirs {
    /// Delivery notes (`Invio BL-`)
    pub bolle: PathBuf,
    /// Exchange credits (`Invio XC-`)
    pub xc: PathBuf,
    /// Order totals accumulation file
    pub gomme: PathBuf,
}

impl OutputDirs {
    pub fn under(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        OutputDirs {
            bolle: data_dir.join("bolle_pdf"),
            xc: data_dir.join("xc_pdf"),
            gomme: data_dir.join("gomme_txt"),
        }
    }

    pub fn ensure_exist(&self) -> Result<()> {
        for dir in [&self.bolle, &self.xc, &self.gomme] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Unable to create directory {:?}", dir))?;
        }
        info!(
            "📁 Created directories: {:?}, {:?}, {:?}",
            self.bolle, self.xc, self.gomme
        );
        Ok(())
    }
}

/// Accepts the IMAP form (`01-Jan-2024`) or ISO (`2024-01-01`)
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%d-%b-%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .with_context(|| format!("Invalid date '{}', expected DD-Mon-YYYY or YYYY-MM-DD", value))
}

impl Config {
    pub fn new() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // First name wins, the others are accepted aliases
        let var = |names: &[&str]| names.iter().find_map(|&name| lookup(name)).filter(|v| !v.is_empty());

        Self::check_required_vars(&var)?;

        let required = |names: &[&str]| {
            var(names).with_context(|| format!("{} must be set", names[0]))
        };

        let data_dir = var(&["DATA_DIR"]).unwrap_or_else(|| "./data".to_string());
        let defaults = OutputDirs::under(&data_dir);

        Ok(Config {
            imap: ImapConfig {
                server: required(&["IMAP_SERVER"])?,
                port: match var(&["IMAP_PORT"]) {
                    Some(port) => port.parse::<u16>().with_context(|| format!("Invalid IMAP_PORT '{}'", port))?,
                    None => 993,
                },
                username: required(&["IMAP_USERNAME", "USERNAME"])?,
                password: required(&["IMAP_PASSWORD", "PASSWORD"])?,
            },
            search: SearchConfig {
                sender: required(&["DISPATCHER_EMAIL", "DISTPATCHER_EMAIL"])?,
                start_date: parse_date(&required(&["EMAIL_START_DATE"])?)?,
                end_date: var(&["EMAIL_END_DATE"]).map(|d| parse_date(&d)).transpose()?,
            },
            output: OutputDirs {
                bolle: var(&["BOLLE_DIR"]).map(PathBuf::from).unwrap_or(defaults.bolle),
                xc: var(&["XC_DIR"]).map(PathBuf::from).unwrap_or(defaults.xc),
                gomme: var(&["GOMME_DIR"]).map(PathBuf::from).unwrap_or(defaults.gomme),
            },
            data_dir,
            scheduler: SchedulerConfig {
                enabled: var(&["SCHEDULER_ENABLED"])
                    .map(|v| v.parse().unwrap_or(false))
                    .unwrap_or(false),
                schedule_times: var(&["SCHEDULER_TIMES"])
                    .unwrap_or_else(|| "02:00".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
        })
    }

    /// Point every output directory under a new data dir
    pub fn with_data_dir(mut self, data_dir: &str) -> Self {
        self.data_dir = data_dir.to_string();
        self.output = OutputDirs::under(data_dir);
        self
    }

    fn check_required_vars(var: &impl Fn(&[&str]) -> Option<String>) -> Result<()> {
        let required_vars: [&[&str]; 5] = [
            &["IMAP_SERVER"],
            &["IMAP_USERNAME", "USERNAME"],
            &["IMAP_PASSWORD", "PASSWORD"],
            &["DISPATCHER_EMAIL", "DISTPATCHER_EMAIL"],
            &["EMAIL_START_DATE"],
        ];

        let missing_vars: Vec<&str> = required_vars
            .iter()
            .filter(|names| var(**names).is_none())
            .map(|names| names[0])
            .collect();

        if !missing_vars.is_empty() {
            anyhow::bail!(
                "Missing environment variables: {}\n\
                 \n\
                 💡 Solutions:\n\
                 1. Create a .env file with your credentials:\n\
                    IMAP_SERVER=imap.example.com\n\
                    IMAP_USERNAME=ordini@example.com\n\
                    IMAP_PASSWORD=...\n\
                    DISPATCHER_EMAIL=noreply@fornitore.it\n\
                    EMAIL_START_DATE=01-Jan-2024\n\
                 \n\
                 2. Or export them manually and run:\n\
                    cargo run -- --check-config",
                missing_vars.join(", ")
            );
        }

        Ok(())
    }
}

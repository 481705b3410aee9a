use anyhow::Result;
use clap::Parser;
use log::{info, error};

use ordermail::config::{parse_date, Config};
use ordermail::email::{OrderMailProcessor, ProcessingResult};

#[derive(Parser)]
#[command(name = "ordermail")]
#[command(about = "Saves supplier delivery notes, exchange credits and order totals from the mailbox")]
#[command(version = "0.1.0")]
struct Args {
    /// Dry-run mode: fetch and classify emails without writing any file
    #[arg(short, long)]
    dry_run: bool,

    /// Daemon mode: run on the SCHEDULER_TIMES schedule
    #[arg(long)]
    daemon: bool,

    /// Output base directory (overrides DATA_DIR, BOLLE_DIR, XC_DIR and GOMME_DIR)
    #[arg(short = 'o', long)]
    data_dir: Option<String>,

    /// Maximum number of emails to process (default: unlimited)
    #[arg(short = 'l', long)]
    limit: Option<usize>,

    /// First day to search, DD-Mon-YYYY or YYYY-MM-DD (overrides EMAIL_START_DATE)
    #[arg(long)]
    since: Option<String>,

    /// Day after the last one to search (overrides EMAIL_END_DATE)
    #[arg(long)]
    before: Option<String>,

    /// Check the configuration without connecting
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::init();

    if args.dry_run {
        info!("🧪 Starting order mail client in DRY-RUN mode");
    } else {
        info!("🚀 Starting order mail client");
    }

    let mut config = Config::new()?;

    if let Some(data_dir) = &args.data_dir {
        config = config.with_data_dir(data_dir);
    }
    if let Some(since) = &args.since {
        config.search.start_date = parse_date(since)?;
    }
    if let Some(before) = &args.before {
        config.search.end_date = Some(parse_date(before)?);
    }

    if args.check_config {
        println!("✅ Configuration valid!");
        println!("📧 IMAP: {}@{}:{}", config.imap.username, config.imap.server, config.imap.port);
        println!("📨 Sender: {}", config.search.sender);
        println!("📅 Range: {} → {}", config.search.start_date, config.search.end_date_or_tomorrow());
        println!("📁 Delivery notes: {}", config.output.bolle.display());
        println!("📁 Exchange credits: {}", config.output.xc.display());
        println!("📁 Order totals: {}", config.output.gomme.display());
        return Ok(());
    }

    if args.daemon {
        info!("🔄 Starting in daemon mode");
        run_daemon_mode(config, args).await?;
        return Ok(());
    }

    match run_once(config, args.dry_run, args.limit).await {
        Ok(result) => {
            if args.dry_run {
                info!("✅ Dry-run analysis completed. {} emails analyzed.", result.emails_processed);
            } else {
                info!("✅ Processing completed. {} emails processed, {} record(s) saved.",
                      result.emails_processed, result.records());
            }
        }
        Err(e) => {
            error!("❌ Error while processing emails: {:#}", e);
            return Err(e);
        }
    }

    Ok(())
}

async fn run_once(config: Config, dry_run: bool, limit: Option<usize>) -> Result<ProcessingResult> {
    if dry_run {
        return OrderMailProcessor::new(config).process_emails_dry_run(limit).await;
    }

    config.output.ensure_exist()?;
    OrderMailProcessor::new(config).process_emails(limit).await
}

/// "HH:MM" → cron expression firing every day at that time
fn cron_expression(schedule_time: &str) -> Option<String> {
    let (hour, minute) = schedule_time.split_once(':')?;
    let hour: u32 = hour.trim().parse().ok().filter(|h| *h < 24)?;
    let minute: u32 = minute.trim().parse().ok().filter(|m| *m < 60)?;

    // Format cron: "sec minute hour * * *"
    Some(format!("0 {} {} * * *", minute, hour))
}

async fn run_daemon_mode(config: Config, args: Args) -> Result<()> {
    use tokio_cron_scheduler::{JobScheduler, Job};
    use chrono::{Local, Timelike};

    if !config.scheduler.enabled {
        error!("❌ Daemon mode requires SCHEDULER_ENABLED=true");
        anyhow::bail!("Scheduler not enabled in the configuration");
    }

    if config.scheduler.schedule_times.is_empty() {
        error!("❌ No schedule defined (SCHEDULER_TIMES)");
        anyhow::bail!("No schedule defined");
    }

    info!("📅 Configured run times: {:?}", config.scheduler.schedule_times);

    let scheduler = JobScheduler::new().await?;

    for schedule_time in &config.scheduler.schedule_times {
        let Some(cron_expr) = cron_expression(schedule_time) else {
            error!("❌ Invalid schedule time: {}. Use the HH:MM format", schedule_time);
            continue;
        };

        info!("📆 Adding scheduled job: {} (cron: {})", schedule_time, cron_expr);

        let config_clone = config.clone();
        let dry_run = args.dry_run;
        let limit = args.limit;
        let schedule_time_clone = schedule_time.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
            let config = config_clone.clone();
            let schedule_time = schedule_time_clone.clone();

            Box::pin(async move {
                info!("⏰ Scheduled run at {} - fetching emails...", schedule_time);

                match run_once(config, dry_run, limit).await {
                    Ok(result) => {
                        info!("✅ Scheduled run completed. {} emails processed, {} record(s) saved at {}",
                              result.emails_processed, result.records(), schedule_time);
                    }
                    Err(e) => {
                        error!("❌ Error during scheduled run at {}: {:#}", schedule_time, e);
                    }
                }
            })
        })?;

        scheduler.add(job).await?;
    }

    scheduler.start().await?;

    info!("✅ Daemon started. Waiting for scheduled times...");
    info!("⏸️  Press Ctrl+C to stop the daemon");

    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;

        let now = Local::now();
        if now.minute() == 0 {
            info!("💓 Daemon alive - {}", now.format("%Y-%m-%d %H:%M"));
        }
    }
}

//! BatchPlan CLI - resource planning and job tracking for HPC clusters

use anyhow::Context;
use batchplan::cluster::{architectures, queues, ClusterContext, RemoteCluster};
use batchplan::config::{CliArgs, Commands, OutputFormat, RemoteConfig};
use batchplan::monitor::JobMonitor;
use batchplan::planner::{QsQueueMetrics, ResourcePlan, ResourcePlanner, ResourceRequest};
use batchplan::process::{ProcessRunner, SystemProcessRunner};
use batchplan::queue::queue_commands;
use clap::Parser;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = CliArgs::parse();

    init_logging(args.verbose, args.log_json);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, json: bool) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = RemoteConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let cluster = ClusterContext::new(args.cluster.map(RemoteCluster::from).or(config.cluster))
        .cluster();
    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner::new());

    match &args.command {
        Commands::Plan { request, subtasks } => {
            cmd_plan(&config, runner, cluster, request, *subtasks, args.output_format)
        }
        Commands::Catalog => cmd_catalog(cluster, args.output_format),
        Commands::Status { task } => cmd_status(&config, runner, task, args.output_format),
        Commands::Cancel { task } => cmd_cancel(&config, runner, task),
    }
}

fn cmd_plan(
    config: &RemoteConfig,
    runner: Arc<dyn ProcessRunner>,
    cluster: RemoteCluster,
    request_path: &Path,
    subtasks: u32,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(request_path)
        .with_context(|| format!("Failed to read request {}", request_path.display()))?;
    let request: ResourceRequest =
        serde_json::from_str(&text).context("Failed to parse resource request")?;
    let request = config.overrides.apply(&request);

    let mut planner = ResourcePlanner::new(&config.group);
    if let (Some(csv), false) = (&config.queue_metrics_csv, cluster.is_cloud()) {
        planner = planner.with_metrics(Box::new(
            QsQueueMetrics::new(runner, csv).with_directorate(&config.directorate),
        ));
        if let Err(e) = planner.refresh_metrics() {
            tracing::warn!("Queue metrics unavailable: {}", e);
        }
    }

    let plan = planner.plan(&request, subtasks, cluster)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text => print_plan(&plan),
    }
    Ok(())
}

fn print_plan(plan: &ResourcePlan) {
    if !plan.enabled {
        println!("Remote execution disabled");
        return;
    }
    println!("=== Resource Plan ({}) ===", plan.cluster);
    println!("Architecture:       {}", plan.architecture);
    println!("Queue:              {}", plan.queue_name);
    println!("Nodes:              {}", plan.node_count);
    println!("Cores per node:     {}", plan.min_cores_per_node);
    println!("Gigs per node:      {}", plan.min_gigs_per_node);
    println!("Active cores/node:  {}", plan.active_cores_per_node);
    println!("Subtasks per core:  {:.2}", plan.subtasks_per_core);
    println!("Wall time:          {}", plan.wall_time);
    println!("Group:              {}", plan.group);
    println!("Estimated cost:     {:.3}", plan.estimated_cost);
}

fn cmd_catalog(cluster: RemoteCluster, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let catalog = json!({
                "cluster": cluster,
                "architectures": architectures(cluster).iter().map(|a| json!({
                    "name": a.name,
                    "description": a.description,
                    "min_cores": a.min_cores,
                    "max_cores": a.max_cores,
                    "gigs_per_core": a.gigs_per_core,
                    "cost_factor": a.cost_factor,
                })).collect::<Vec<_>>(),
                "queues": queues(cluster).iter().map(|q| json!({
                    "name": q.name,
                    "max_wall_hours": q.max_wall_hours.is_finite().then_some(q.max_wall_hours),
                    "auto_select": q.auto_select,
                })).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        OutputFormat::Text => {
            println!("=== Architectures ({}) ===", cluster);
            println!("{:10} {:>6} {:>6} {:>10} {:>6}", "Name", "Min", "Max", "GB/core", "Cost");
            for a in architectures(cluster) {
                println!(
                    "{:10} {:>6} {:>6} {:>10.2} {:>6.3}",
                    a.name, a.min_cores, a.max_cores, a.gigs_per_core, a.cost_factor
                );
            }
            println!("\n=== Queues ===");
            for q in queues(cluster) {
                let limit = if q.max_wall_hours.is_finite() {
                    format!("{} h", q.max_wall_hours)
                } else {
                    "unlimited".to_string()
                };
                let auto = if q.auto_select { "" } else { " (manual)" };
                println!("{:10} {}{}", q.name, limit, auto);
            }
        }
    }
    Ok(())
}

fn cmd_status(
    config: &RemoteConfig,
    runner: Arc<dyn ProcessRunner>,
    task: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut monitor = JobMonitor::new(queue_commands(config, runner));
    monitor.add_to_monitoring(task);
    monitor.update();

    match format {
        OutputFormat::Json => {
            let status = json!({
                "task": task,
                "state": monitor.state(task),
                "finished": monitor.is_finished(task),
                "jobs": monitor.jobs(task),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        OutputFormat::Text => {
            println!("Task: {}", task);
            for job in monitor.jobs(task) {
                println!("  {:>10} {:30} {}", job.id, job.name, job.status);
            }
            if monitor.job_ids(task).is_empty() {
                println!("  no jobs in queue");
            }
            println!("Finished: {}", monitor.is_finished(task));
        }
    }
    Ok(())
}

fn cmd_cancel(
    config: &RemoteConfig,
    runner: Arc<dyn ProcessRunner>,
    task: &str,
) -> anyhow::Result<()> {
    let mut monitor = JobMonitor::new(queue_commands(config, runner));
    monitor.add_to_monitoring(task);
    monitor.update();

    let ids = monitor.job_ids(task);
    monitor.delete_task_jobs(task)?;
    println!("Requested deletion of {} jobs for {}", ids.len(), task);
    Ok(())
}

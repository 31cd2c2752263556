//! Command line driver for the sill/basin model.
//!
//! # Usage
//!
//! ```bash
//! gibraltar --set a=1.75 run --samples 20
//! gibraltar --config scenario.toml classify
//! gibraltar fixed-point
//! gibraltar params
//! ```
//!
//! Logging goes to stderr and is controlled through `RUST_LOG`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gibraltar::fixed_point::{index, search_grid, SearchGrid};
use gibraltar::units::{m_per_second_to_mm_per_year, seconds_to_kyr};
use gibraltar::{GibraltarResult, Parameters, RunConfig, SillBasinModel, Trajectory};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Sill erosion and basin filling model
#[derive(Parser, Debug)]
#[command(name = "gibraltar", version)]
#[command(about = "Integrate and analyse the coupled sill/basin level model")]
struct Args {
    /// TOML run configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Parameter override as name=value (field name or symbol); repeatable
    #[arg(short, long = "set", value_name = "NAME=VALUE", global = true)]
    overrides: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Integrate from the configured initial state and print the trajectory
    Run {
        /// Also print this many evenly spaced samples as a table
        #[arg(short, long)]
        samples: Option<usize>,
    },
    /// Classify the long-term regime
    Classify,
    /// Search for a fixed point and report its Poincaré index
    FixedPoint {
        /// Radius of the circle used for the index
        #[arg(long, default_value_t = 0.01)]
        radius: f64,
        /// Number of points on that circle
        #[arg(long, default_value_t = 100_000)]
        circle_points: usize,
    },
    /// Print the parameter values in effect
    Params,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(args: Args) -> GibraltarResult<()> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_path(path)?,
        None => RunConfig::default(),
    };
    for assignment in &args.overrides {
        config.apply_override(assignment)?;
    }
    let model = config.model();

    match args.command {
        Command::Run { samples } => {
            let trajectory = model.integrate(&config.integration)?;
            info!(
                samples = trajectory.len(),
                accepted = trajectory.stats.accepted_steps,
                switches = trajectory.stats.method_switches,
                "Integration done"
            );
            if let Some(rows) = samples.filter(|&rows| rows > 0) {
                print_trajectory(&model, &trajectory, rows);
            }
            print_summary(&trajectory);
            trajectory.into_result().map(|_| ())
        }
        Command::Classify => {
            let c = model.classify(&config.classification)?;
            println!("regime = {}", c.regime.code());
            println!("description = {}", c.regime.description());
            println!("time_kyr = {}", seconds_to_kyr(c.time));
            println!("sill_level = {}", c.sill_level);
            println!("basin_level = {}", c.basin_level);
            Ok(())
        }
        Command::FixedPoint {
            radius,
            circle_points,
        } => {
            match search_grid(&model, &SearchGrid::default(), &config.classification.newton) {
                Some(root) => {
                    println!("sill_level = {}", root[0]);
                    println!("basin_level = {}", root[1]);
                    let winding = index(&model, root, radius, circle_points);
                    println!("index = {}", winding.round());
                }
                None => println!("no fixed point found"),
            }
            Ok(())
        }
        Command::Params => {
            print!("{}", config.parameters);
            for (name, _) in config.parameters.iter() {
                let info = Parameters::info(name)?;
                info!(
                    parameter = name,
                    symbol = info.symbol,
                    unit = info.unit,
                    "{}",
                    info.description
                );
            }
            Ok(())
        }
    }
}

fn print_summary(trajectory: &Trajectory) {
    if let (Some(t), Some(y)) = (trajectory.end_time(), trajectory.final_state()) {
        println!("end_time_kyr = {}", seconds_to_kyr(t));
        println!("sill_level = {}", y[0]);
        println!("basin_level = {}", y[1]);
    }
    println!("outcome = {:?}", trajectory.outcome);
    println!("samples = {}", trajectory.len());
    println!("evaluations = {}", trajectory.stats.evaluations);
    println!("accepted_steps = {}", trajectory.stats.accepted_steps);
    println!("rejected_steps = {}", trajectory.stats.rejected_steps);
    println!("method_switches = {}", trajectory.stats.method_switches);
}

/// Indices of `rows` evenly spaced samples out of `n`, always ending with the
/// last one. Empty when `rows` is zero.
fn sample_indices(n: usize, rows: usize) -> Vec<usize> {
    match rows {
        _ if n == 0 => return Vec::new(),
        0 => return Vec::new(),
        1 => return vec![n - 1],
        _ => {}
    }
    let stride = if rows < n {
        ((n - 1) / (rows - 1)).max(1)
    } else {
        1
    };
    let mut indices: Vec<usize> = (0..n).step_by(stride).collect();
    if indices.last() != Some(&(n - 1)) {
        indices.push(n - 1);
    }
    indices
}

fn print_trajectory(model: &SillBasinModel, trajectory: &Trajectory, rows: usize) {
    println!("time_kyr\tsill_level\tbasin_level\tocean_level\tslope\tdischarge\tsill_rate_mm_yr");
    for i in sample_indices(trajectory.len(), rows) {
        let d = model.diagnostics(trajectory.sill_level[i], trajectory.basin_level[i]);
        println!(
            "{:.4}\t{:.4}\t{:.4}\t{:.6}\t{:.4e}\t{:.1}\t{:.4}",
            seconds_to_kyr(trajectory.time[i]),
            trajectory.sill_level[i],
            trajectory.basin_level[i],
            trajectory.ocean_level[i],
            d.slope,
            d.discharge,
            m_per_second_to_mm_per_year(d.sill_rate)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_indices() {
        assert!(sample_indices(100, 0).is_empty());
        assert!(sample_indices(0, 5).is_empty());
        assert_eq!(sample_indices(5, 1), vec![4]);
        assert_eq!(sample_indices(11, 3), vec![0, 5, 10]);
        assert_eq!(sample_indices(10, 4), vec![0, 3, 6, 9]);
        assert_eq!(sample_indices(3, 10), vec![0, 1, 2]);
    }
}

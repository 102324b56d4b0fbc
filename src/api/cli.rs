use std::net::{IpAddr, Ipv4Addr};

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::{DEFAULT_BODY_LIMIT, DEFAULT_PORT, ServerConfig, run_http_server};
use crate::core::{
    AccumulationPayload, PortfolioKey, ProjectionEngine, ValidationReport, ValidationRules,
    WithdrawalPayload,
};

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Retirement savings projections and drawdown simulations across three fixed-rate portfolios"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API over HTTP.
    Serve {
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        host: IpAddr,
        #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        #[arg(long, default_value_t = DEFAULT_BODY_LIMIT, help = "Maximum request body in bytes")]
        body_limit: usize,
        #[arg(
            long,
            help = "Accept desired ages below 50 as long as they come after the current age"
        )]
        lenient_retirement_age: bool,
    },
    /// Project accumulation for every portfolio and print the JSON result.
    Project {
        #[arg(long)]
        current_age: u32,
        #[arg(long)]
        desired_age: u32,
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        initial_amount: f64,
        #[arg(long, allow_negative_numbers = true)]
        monthly_contribution: f64,
        #[arg(long)]
        lenient_retirement_age: bool,
    },
    /// Simulate every withdrawal tier from the given balances and print the JSON result.
    Withdraw {
        #[arg(long)]
        retirement_age: u32,
        #[arg(
            long,
            value_delimiter = ',',
            allow_negative_numbers = true,
            help = "Accumulated balances, conservative,moderate,aggressive"
        )]
        accumulated: Vec<f64>,
        #[arg(
            long,
            value_delimiter = ',',
            allow_negative_numbers = true,
            help = "Annual rates as fractions, defaults to each portfolio's own rate"
        )]
        rates: Option<Vec<f64>>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationReport),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode result: {0}")]
    Json(#[from] serde_json::Error),
}

fn rules_for(lenient_retirement_age: bool) -> ValidationRules {
    if lenient_retirement_age {
        ValidationRules::lenient()
    } else {
        ValidationRules::default()
    }
}

pub async fn run_cli(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Serve {
            host,
            port,
            body_limit,
            lenient_retirement_age,
        } => {
            let config = ServerConfig {
                host,
                port,
                body_limit,
                rules: rules_for(lenient_retirement_age),
            };
            run_http_server(config).await?;
        }
        Command::Project {
            current_age,
            desired_age,
            initial_amount,
            monthly_contribution,
            lenient_retirement_age,
        } => {
            let payload = AccumulationPayload {
                current_age: Some(Value::from(current_age)),
                desired_age: Some(Value::from(desired_age)),
                initial_amount: Some(Value::from(initial_amount)),
                monthly_contribution: Some(Value::from(monthly_contribution)),
            };
            let request = payload.into_request(&rules_for(lenient_retirement_age))?;
            debug!(?request, "projecting accumulation");
            print_json(&ProjectionEngine::default().project_accumulation(&request))?;
        }
        Command::Withdraw {
            retirement_age,
            accumulated,
            rates,
        } => {
            let engine = ProjectionEngine::default();
            let rates = rates.unwrap_or_else(|| {
                let defaults = engine.portfolio_rates();
                PortfolioKey::ALL
                    .into_iter()
                    .map(|key| *defaults.get(key))
                    .collect()
            });
            let payload = WithdrawalPayload {
                accumulated_values: Some(Value::from(accumulated)),
                rates: Some(Value::from(rates)),
                retirement_age: Some(Value::from(retirement_age)),
            };
            let request = payload.into_request(&ValidationRules::default())?;
            debug!(?request, "simulating withdrawal tiers");
            print_json(&engine.project_withdrawal_scenarios(&request))?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_project_arguments() {
        let cli = Cli::try_parse_from([
            "nestegg",
            "project",
            "--current-age",
            "30",
            "--desired-age",
            "60",
            "--monthly-contribution",
            "1000",
        ])
        .expect("arguments should parse");
        match cli.command {
            Command::Project {
                current_age,
                desired_age,
                initial_amount,
                monthly_contribution,
                lenient_retirement_age,
            } => {
                assert_eq!(current_age, 30);
                assert_eq!(desired_age, 60);
                assert_eq!(initial_amount, 0.0);
                assert_eq!(monthly_contribution, 1_000.0);
                assert!(!lenient_retirement_age);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_comma_separated_withdrawal_balances() {
        let cli = Cli::try_parse_from([
            "nestegg",
            "withdraw",
            "--retirement-age",
            "65",
            "--accumulated",
            "100000,200000,300000",
            "--rates",
            "0.05,0.07,0.09",
        ])
        .expect("arguments should parse");
        match cli.command {
            Command::Withdraw {
                retirement_age,
                accumulated,
                rates,
            } => {
                assert_eq!(retirement_age, 65);
                assert_eq!(accumulated, vec![100_000.0, 200_000.0, 300_000.0]);
                assert_eq!(rates, Some(vec![0.05, 0.07, 0.09]));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn serve_defaults_to_port_3000_on_all_interfaces() {
        let cli = Cli::try_parse_from(["nestegg", "serve", "--port", "3000"])
            .expect("arguments should parse");
        match cli.command {
            Command::Serve {
                host,
                port,
                body_limit,
                lenient_retirement_age,
            } => {
                assert_eq!(host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
                assert_eq!(port, 3000);
                assert_eq!(body_limit, 1024 * 1024);
                assert!(!lenient_retirement_age);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn project_command_reports_validation_errors() {
        let cli = Cli::try_parse_from([
            "nestegg",
            "project",
            "--current-age",
            "17",
            "--desired-age",
            "17",
            "--monthly-contribution",
            "-5",
        ])
        .expect("arguments should parse");
        let err = run_cli(cli).await.expect_err("must reject invalid ages");
        match err {
            CliError::Validation(report) => assert_eq!(report.errors.len(), 3),
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn withdraw_command_rejects_wrong_balance_count() {
        let cli = Cli::try_parse_from([
            "nestegg",
            "withdraw",
            "--retirement-age",
            "65",
            "--accumulated",
            "1,2",
        ])
        .expect("arguments should parse");
        let err = run_cli(cli).await.expect_err("must reject two balances");
        assert!(err.to_string().contains("accumulatedValues must be an array with 3 elements"));
    }
}

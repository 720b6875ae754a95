//! Simulation results: what the simulator reports and what the evaluator keeps.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// Performance statistics of one simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRecord {
    pub total_distance: f64,
    pub total_travel_time: f64,
    pub pickup_tardiness: f64,
    pub delivery_tardiness: f64,
    pub overtime: f64,
    /// Simulated time reached when the run ended, in milliseconds.
    pub simulation_time: f64,
    pub computation_time_ms: u64,
    pub total_parcels: u32,
    pub total_pickups: u32,
    pub total_deliveries: u32,
    pub total_vehicles: u32,
    pub vehicles_at_depot: u32,
    pub simulation_finished: bool,
}

/// Raw auction counters read from the simulator's auction model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionCounters {
    pub parcels: u32,
    pub auctions: u32,
    pub unsuccessful: u32,
    pub failed: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionStats {
    pub parcels: u32,
    /// Every auction beyond the first one per parcel.
    pub reauctions: u32,
    pub unsuccessful: u32,
    pub failed: u32,
}

impl From<AuctionCounters> for AuctionStats {
    fn from(c: AuctionCounters) -> Self {
        Self {
            parcels: c.parcels,
            reauctions: c.auctions.saturating_sub(c.parcels),
            unsuccessful: c.unsuccessful,
            failed: c.failed,
        }
    }
}

/// What a simulator returns for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub stats: StatisticsRecord,
    /// Absent when the scenario has no auction model.
    pub auction: Option<AuctionCounters>,
    /// The run was terminated before the scenario completed.
    pub aborted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultObject {
    pub stats: StatisticsRecord,
    pub auction: Option<AuctionStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SimulationOutcome {
    Completed(ResultObject),
    /// `progress` measures how far the run got (simulated milliseconds).
    Aborted { partial: ResultObject, progress: f64 },
}

impl SimulationOutcome {
    pub fn result(&self) -> &ResultObject {
        match self {
            Self::Completed(result) => result,
            Self::Aborted { partial, .. } => partial,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

/// Decides what is kept from a run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcessor {
    /// Statistics only.
    Statistics,
    /// Statistics plus auction counters, when the simulator has them.
    Auction,
}

impl PostProcessor {
    pub fn collect(&self, report: RunReport) -> SimulationOutcome {
        let auction = match self {
            Self::Statistics => None,
            Self::Auction => report.auction.map(AuctionStats::from),
        };
        let result = ResultObject {
            stats: report.stats,
            auction,
        };
        if report.aborted {
            let progress = result.stats.simulation_time;
            SimulationOutcome::Aborted {
                partial: result,
                progress,
            }
        } else {
            SimulationOutcome::Completed(result)
        }
    }
}

impl FromStr for PostProcessor {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "statistics" => Ok(Self::Statistics),
            "auction" => Ok(Self::Auction),
            other => Err(EvalError::Configuration(format!(
                "unrecognized post-processor '{other}' (expected statistics or auction)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(aborted: bool) -> RunReport {
        RunReport {
            stats: StatisticsRecord {
                simulation_time: 3_600_000.0,
                total_parcels: 40,
                ..Default::default()
            },
            auction: Some(AuctionCounters {
                parcels: 40,
                auctions: 52,
                unsuccessful: 3,
                failed: 1,
            }),
            aborted,
        }
    }

    #[test]
    fn auction_processor_derives_reauctions() {
        let outcome = PostProcessor::Auction.collect(report(false));
        let auction = outcome.result().auction.unwrap();
        assert_eq!(auction.reauctions, 12);
        assert_eq!(auction.unsuccessful, 3);
        assert!(!outcome.is_aborted());
    }

    #[test]
    fn statistics_processor_drops_auction_counters() {
        let outcome = PostProcessor::Statistics.collect(report(false));
        assert!(outcome.result().auction.is_none());
    }

    #[test]
    fn aborted_report_keeps_partial_data_and_progress() {
        match PostProcessor::Auction.collect(report(true)) {
            SimulationOutcome::Aborted { partial, progress } => {
                assert_eq!(progress, 3_600_000.0);
                assert_eq!(partial.stats.total_parcels, 40);
            }
            other => panic!("expected aborted outcome, got {other:?}"),
        }
    }

    #[test]
    fn reauctions_never_underflow() {
        let stats = AuctionStats::from(AuctionCounters {
            parcels: 5,
            auctions: 3,
            unsuccessful: 0,
            failed: 0,
        });
        assert_eq!(stats.reauctions, 0);
    }
}

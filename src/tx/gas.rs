//! Gas estimation from simulated execution plus intrinsic cost

use crate::chain::ThorProvider;
use crate::codec::{intrinsic_gas, Clause};
use crate::error::DriverResult;

use ethers::types::{Address, H256};
use tracing::{debug, warn};

/// Headroom added on top of simulated execution gas
pub const EXECUTION_GAS_BUFFER: u64 = 15_000;

/// Gas estimator for transactions
#[derive(Debug, Clone)]
pub struct GasEstimator {
    /// Added only when execution consumes gas
    execution_buffer: u64,
}

impl GasEstimator {
    /// Create a new gas estimator
    pub fn new() -> Self {
        Self {
            execution_buffer: EXECUTION_GAS_BUFFER,
        }
    }

    /// Estimate the gas limit for `clauses` sent by `caller` on top of block `revision`.
    ///
    /// Simulation failures propagate unchanged.
    pub async fn estimate(
        &self,
        provider: &ThorProvider,
        clauses: &[Clause],
        caller: Address,
        revision: H256,
    ) -> DriverResult<u64> {
        let outputs = provider.explain(clauses, caller, revision).await?;

        for (index, output) in outputs.iter().enumerate() {
            if output.reverted {
                warn!(
                    "Clause {} reverted during simulation: {}",
                    index, output.vm_error
                );
            }
        }

        let exec_gas: u64 = outputs.iter().map(|o| o.gas_used).sum();
        let gas = self.limit(intrinsic_gas(clauses), exec_gas);

        debug!(
            "Gas estimate for {} clauses: exec={} total={}",
            clauses.len(),
            exec_gas,
            gas
        );
        Ok(gas)
    }

    /// Combine intrinsic and execution gas. Pure transfers (no execution gas) pay only
    /// the intrinsic cost.
    pub fn limit(&self, intrinsic: u64, exec_gas: u64) -> u64 {
        if exec_gas > 0 {
            intrinsic + exec_gas + self.execution_buffer
        } else {
            intrinsic
        }
    }
}

impl Default for GasEstimator {
    fn default() -> Self {
        Self::new()
    }
}

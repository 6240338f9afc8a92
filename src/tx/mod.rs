//! Transaction building, fee-delegated signing and submission

mod assembler;
mod commit;
mod delegation;
mod gas;

pub use assembler::{AssembledTx, BuildContext, BuildTxOptions, TransactionAssembler};
pub use commit::{notify, submit, CommitObserver, TxObject, TxResponse};
pub use delegation::{sign_transaction, Delegation, DelegationResponse, SignedTx, SigningPath};
pub use gas::{GasEstimator, EXECUTION_GAS_BUFFER};

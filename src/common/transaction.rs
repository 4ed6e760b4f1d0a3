/// Passive transaction handle threaded through index operations.
///
/// The storage core runs single-threaded and cooperative; the handle carries
/// no locking or recovery state, it only identifies the caller for the
/// duration of a call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    txn_id: u64,
}

impl Transaction {
    pub fn new(txn_id: u64) -> Self {
        Self { txn_id }
    }

    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }
}

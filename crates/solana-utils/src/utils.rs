use serde::Deserialize;

/// A value with the slot of the context it was read at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithSlot<T> {
    slot: u64,
    value: T,
}

impl<T> WithSlot<T> {
    /// Create a new [`WithSlot`].
    pub fn new(slot: u64, value: T) -> Self {
        Self { slot, value }
    }

    /// Get the slot.
    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Get the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consume and return the value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Apply a function to the value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WithSlot<U> {
        WithSlot {
            slot: self.slot,
            value: f(self.value),
        }
    }
}

impl<T, E> WithSlot<Result<T, E>> {
    /// Transpose.
    pub fn transpose(self) -> Result<WithSlot<T>, E> {
        match self.value {
            Ok(value) => Ok(WithSlot {
                slot: self.slot,
                value,
            }),
            Err(err) => Err(err),
        }
    }
}

impl<T> WithSlot<Option<T>> {
    /// Transpose.
    pub fn transpose(self) -> Option<WithSlot<T>> {
        self.value.map(|value| WithSlot {
            slot: self.slot,
            value,
        })
    }
}

/// Status of a submitted transaction, as returned by `getSignatureStatuses`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    /// Slot the transaction was processed in.
    pub slot: u64,
    /// Number of blocks since confirmation, `None` once rooted.
    pub confirmations: Option<usize>,
    /// JSON encoded `TransactionError` if the transaction failed.
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    /// Cluster confirmation status.
    #[serde(default)]
    pub confirmation_status: Option<String>,
}

impl SignatureStatus {
    /// Returns whether the status satisfies the given commitment level.
    pub fn satisfies(&self, commitment: &str) -> bool {
        let rank = |level: &str| match level {
            "processed" => 0,
            "confirmed" => 1,
            "finalized" => 2,
            _ => 1,
        };
        match self.confirmation_status.as_deref() {
            Some(status) => rank(status) >= rank(commitment),
            // Older nodes only report the number of confirmations.
            None => self.confirmations.is_none() || commitment != "finalized",
        }
    }
}

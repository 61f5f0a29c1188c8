/// Error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An upstream service could not be reached.
    #[error("upstream `{service}` unavailable: {reason}")]
    UpstreamUnavailable {
        /// Service name.
        service: &'static str,
        /// Reason.
        reason: String,
    },
    /// The oracle returned no price for any requested asset.
    #[error("no price data at timestamp {timestamp}")]
    NoDataAtTimestamp {
        /// Requested timestamp.
        timestamp: i64,
    },
    /// Prices that cannot be used to compute a return.
    #[error("invalid price data for asset `{asset}`: {reason}")]
    InvalidPriceData {
        /// Asset.
        asset: String,
        /// Reason.
        reason: String,
    },
    /// Portfolio weights do not sum to 100.
    #[error("invalid allocation of `{owner}`: weights sum to {total}")]
    InvalidAllocation {
        /// Portfolio owner.
        owner: String,
        /// Sum of weights.
        total: u32,
    },
    /// Nothing to rank.
    #[error("no participants{}", in_tournament(.tournament))]
    NoParticipants {
        /// Tournament, if known.
        tournament: Option<String>,
    },
    /// The tournament has been (or is being) finalized.
    #[error("tournament `{tournament}` is already finalized")]
    AlreadyFinalized {
        /// Tournament.
        tournament: String,
    },
    /// The ledger refused the settlement transaction.
    #[error("settlement of tournament `{tournament}` rejected: {reason}")]
    SettlementRejected {
        /// Tournament.
        tournament: String,
        /// Reason.
        reason: String,
    },
    /// The tournament window is still open.
    #[error("tournament `{tournament}` has not ended, it ends at {end_time}")]
    TournamentNotEnded {
        /// Tournament.
        tournament: String,
        /// End timestamp.
        end_time: i64,
    },
    /// No tournament account at the given address.
    #[error("tournament `{tournament}` not found")]
    TournamentNotFound {
        /// Tournament.
        tournament: String,
    },
    /// Solana utils error.
    #[error(transparent)]
    SolanaUtils(#[from] arena_solana_utils::Error),
    /// Custom error.
    #[error("custom: {0}")]
    Custom(String),
}

fn in_tournament(tournament: &Option<String>) -> String {
    match tournament {
        Some(tournament) => format!(" in tournament `{tournament}`"),
        None => String::new(),
    }
}

impl Error {
    /// Create a custom error.
    pub fn custom(msg: impl ToString) -> Self {
        Self::Custom(msg.to_string())
    }

    /// Create an [`Error::UpstreamUnavailable`].
    pub fn upstream(service: &'static str, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            service,
            reason: reason.to_string(),
        }
    }

    /// Create an [`Error::InvalidPriceData`].
    pub fn invalid_price(asset: impl ToString, reason: impl ToString) -> Self {
        Self::InvalidPriceData {
            asset: asset.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Self::NoDataAtTimestamp { .. } => ErrorKind::NoDataAtTimestamp,
            Self::InvalidPriceData { .. } => ErrorKind::InvalidPriceData,
            Self::InvalidAllocation { .. } => ErrorKind::InvalidAllocation,
            Self::NoParticipants { .. } => ErrorKind::NoParticipants,
            Self::AlreadyFinalized { .. } => ErrorKind::AlreadyFinalized,
            Self::SettlementRejected { .. } => ErrorKind::SettlementRejected,
            Self::TournamentNotEnded { .. } => ErrorKind::TournamentNotEnded,
            Self::TournamentNotFound { .. } => ErrorKind::TournamentNotFound,
            Self::SolanaUtils(err) if err.is_transient() => ErrorKind::UpstreamUnavailable,
            Self::SolanaUtils(_) | Self::Custom(_) => ErrorKind::Internal,
        }
    }

    /// Returns whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::UpstreamUnavailable { .. } => true,
            Self::SolanaUtils(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::UpstreamUnavailable`].
    UpstreamUnavailable,
    /// See [`Error::NoDataAtTimestamp`].
    NoDataAtTimestamp,
    /// See [`Error::InvalidPriceData`].
    InvalidPriceData,
    /// See [`Error::InvalidAllocation`].
    InvalidAllocation,
    /// See [`Error::NoParticipants`].
    NoParticipants,
    /// See [`Error::AlreadyFinalized`].
    AlreadyFinalized,
    /// See [`Error::SettlementRejected`].
    SettlementRejected,
    /// See [`Error::TournamentNotEnded`].
    TournamentNotEnded,
    /// See [`Error::TournamentNotFound`].
    TournamentNotFound,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::NoDataAtTimestamp => "NO_DATA_AT_TIMESTAMP",
            Self::InvalidPriceData => "INVALID_PRICE_DATA",
            Self::InvalidAllocation => "INVALID_ALLOCATION",
            Self::NoParticipants => "NO_PARTICIPANTS",
            Self::AlreadyFinalized => "ALREADY_FINALIZED",
            Self::SettlementRejected => "SETTLEMENT_REJECTED",
            Self::TournamentNotEnded => "TOURNAMENT_NOT_ENDED",
            Self::TournamentNotFound => "TOURNAMENT_NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

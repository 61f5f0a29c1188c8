use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;

use crate::types::{Portfolio, TokenAllocation};

/// Anchor discriminator length.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Offset of the tournament key in a `UserPortfolio` account.
pub const USER_PORTFOLIO_TOURNAMENT_OFFSET: usize = DISCRIMINATOR_LEN + 32;

fn sighash(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let hash = Sha256::digest(format!("{namespace}:{name}").as_bytes());
    let mut discriminator = [0; DISCRIMINATOR_LEN];
    discriminator.copy_from_slice(&hash[..DISCRIMINATOR_LEN]);
    discriminator
}

/// Anchor discriminator of an account type.
pub fn account_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    sighash("account", name)
}

/// Anchor discriminator of an instruction.
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    sighash("global", name)
}

/// Account types owned by the tournament program.
pub trait ProgramAccount: Sized {
    /// Account type name.
    const NAME: &'static str;

    /// Anchor discriminator.
    fn discriminator() -> [u8; DISCRIMINATOR_LEN] {
        account_discriminator(Self::NAME)
    }

    /// Decode from account data, checking the discriminator.
    fn decode(data: &[u8]) -> crate::Result<Self>;

    /// Encode into account data, prefixed with the discriminator.
    fn encode(&self) -> Vec<u8>;
}

fn check_discriminator<T: ProgramAccount>(data: &[u8]) -> crate::Result<&[u8]> {
    if data.len() < DISCRIMINATOR_LEN {
        return Err(crate::Error::custom(format!(
            "`{}` account data too short",
            T::NAME
        )));
    }
    let (discriminator, body) = data.split_at(DISCRIMINATOR_LEN);
    if discriminator != T::discriminator() {
        return Err(crate::Error::custom(format!(
            "discriminator mismatch, not a `{}` account",
            T::NAME
        )));
    }
    Ok(body)
}

fn encode_with<T: ProgramAccount>(raw: &impl BorshSerialize) -> Vec<u8> {
    let mut data = T::discriminator().to_vec();
    // Writing into a `Vec` cannot fail.
    if let Err(err) = raw.serialize(&mut data) {
        tracing::error!(%err, account = T::NAME, "failed to serialize account");
    }
    data
}

/// On-chain tournament.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tournament {
    /// Tournament id, unique per creator.
    pub id: u64,
    /// Creator.
    pub creator: Pubkey,
    /// Entry fee in lamports.
    pub entry_fee: u64,
    /// Start timestamp.
    pub start_time: u64,
    /// End timestamp.
    pub end_time: u64,
    /// Collected entry fees.
    pub prize_pool: u64,
    /// Set once by `finalize_tournament`.
    pub is_finalized: bool,
    /// Set once by `finalize_tournament`.
    pub winner: Option<Pubkey>,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct RawTournament {
    id: u64,
    creator: [u8; 32],
    entry_fee: u64,
    start_time: u64,
    end_time: u64,
    prize_pool: u64,
    is_finalized: bool,
    winner: Option<[u8; 32]>,
}

impl ProgramAccount for Tournament {
    const NAME: &'static str = "Tournament";

    fn decode(data: &[u8]) -> crate::Result<Self> {
        let mut body = check_discriminator::<Self>(data)?;
        // Later program versions append fields, so trailing bytes are allowed.
        let raw = RawTournament::deserialize(&mut body).map_err(crate::Error::custom)?;
        Ok(Self {
            id: raw.id,
            creator: Pubkey::new_from_array(raw.creator),
            entry_fee: raw.entry_fee,
            start_time: raw.start_time,
            end_time: raw.end_time,
            prize_pool: raw.prize_pool,
            is_finalized: raw.is_finalized,
            winner: raw.winner.map(Pubkey::new_from_array),
        })
    }

    fn encode(&self) -> Vec<u8> {
        encode_with::<Self>(&RawTournament {
            id: self.id,
            creator: self.creator.to_bytes(),
            entry_fee: self.entry_fee,
            start_time: self.start_time,
            end_time: self.end_time,
            prize_pool: self.prize_pool,
            is_finalized: self.is_finalized,
            winner: self.winner.map(|winner| winner.to_bytes()),
        })
    }
}

impl Tournament {
    /// Start timestamp as a signed unix timestamp.
    pub fn start_timestamp(&self) -> i64 {
        i64::try_from(self.start_time).unwrap_or(i64::MAX)
    }

    /// End timestamp as a signed unix timestamp.
    pub fn end_timestamp(&self) -> i64 {
        i64::try_from(self.end_time).unwrap_or(i64::MAX)
    }
}

/// On-chain user portfolio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPortfolio {
    /// Owner.
    pub user: Pubkey,
    /// Tournament.
    pub tournament: Pubkey,
    /// Token mints and their weights.
    pub weights: Vec<(Pubkey, u8)>,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct RawTokenAllocation {
    mint: [u8; 32],
    weight: u8,
}

#[derive(BorshSerialize, BorshDeserialize)]
struct RawUserPortfolio {
    user: [u8; 32],
    tournament: [u8; 32],
    weights: Vec<RawTokenAllocation>,
}

impl ProgramAccount for UserPortfolio {
    const NAME: &'static str = "UserPortfolio";

    fn decode(data: &[u8]) -> crate::Result<Self> {
        let mut body = check_discriminator::<Self>(data)?;
        let raw = RawUserPortfolio::deserialize(&mut body).map_err(crate::Error::custom)?;
        Ok(Self {
            user: Pubkey::new_from_array(raw.user),
            tournament: Pubkey::new_from_array(raw.tournament),
            weights: raw
                .weights
                .into_iter()
                .map(|w| (Pubkey::new_from_array(w.mint), w.weight))
                .collect(),
        })
    }

    fn encode(&self) -> Vec<u8> {
        encode_with::<Self>(&RawUserPortfolio {
            user: self.user.to_bytes(),
            tournament: self.tournament.to_bytes(),
            weights: self
                .weights
                .iter()
                .map(|(mint, weight)| RawTokenAllocation {
                    mint: mint.to_bytes(),
                    weight: *weight,
                })
                .collect(),
        })
    }
}

impl From<UserPortfolio> for Portfolio {
    fn from(value: UserPortfolio) -> Self {
        Self {
            owner: value.user.to_string(),
            tournament: value.tournament.to_string(),
            allocations: value
                .weights
                .into_iter()
                .map(|(mint, weight)| TokenAllocation::new(mint.to_string(), weight))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tournament() -> Tournament {
        Tournament {
            id: 1_700_000_000_000,
            creator: Pubkey::new_unique(),
            entry_fee: 100_000_000,
            start_time: 1_700_000_000,
            end_time: 1_700_086_400,
            prize_pool: 300_000_000,
            is_finalized: false,
            winner: None,
        }
    }

    #[test]
    fn tournament_layout() {
        let tournament = tournament();
        let data = tournament.encode();
        // discriminator + id + creator + 4 * u64 + bool + option tag
        assert_eq!(data.len(), 8 + 8 + 32 + 8 * 4 + 1 + 1);
        assert_eq!(&data[..8], &account_discriminator("Tournament"));
        assert_eq!(&data[8..16], &tournament.id.to_le_bytes());
        assert_eq!(Tournament::decode(&data).unwrap(), tournament);
    }

    #[test]
    fn tournament_with_trailing_fields() {
        let mut tournament = tournament();
        tournament.is_finalized = true;
        tournament.winner = Some(Pubkey::new_unique());
        let mut data = tournament.encode();
        data.extend_from_slice(&[0; 16]);
        assert_eq!(Tournament::decode(&data).unwrap(), tournament);
    }

    #[test]
    fn reject_wrong_discriminator() {
        let portfolio = UserPortfolio {
            user: Pubkey::new_unique(),
            tournament: Pubkey::new_unique(),
            weights: vec![],
        };
        let data = portfolio.encode();
        assert!(Tournament::decode(&data).is_err());
        assert!(Tournament::decode(&data[..4]).is_err());
    }

    #[test]
    fn user_portfolio_layout() {
        let mint = Pubkey::new_unique();
        let portfolio = UserPortfolio {
            user: Pubkey::new_unique(),
            tournament: Pubkey::new_unique(),
            weights: vec![(mint, 70), (Pubkey::new_unique(), 30)],
        };
        let data = portfolio.encode();
        assert_eq!(
            &data[USER_PORTFOLIO_TOURNAMENT_OFFSET..USER_PORTFOLIO_TOURNAMENT_OFFSET + 32],
            portfolio.tournament.as_ref()
        );
        let decoded = UserPortfolio::decode(&data).unwrap();
        assert_eq!(decoded, portfolio);

        let portfolio = Portfolio::from(decoded);
        assert_eq!(portfolio.allocations[0].asset, mint.to_string());
        assert_eq!(portfolio.total_weight(), 100);
    }

    #[test]
    fn known_discriminators() {
        // Anchor: sha256("global:finalize_tournament")[..8]
        let expected = &Sha256::digest(b"global:finalize_tournament")[..8];
        assert_eq!(&instruction_discriminator("finalize_tournament"), expected);
        assert_ne!(
            account_discriminator("Tournament"),
            account_discriminator("UserPortfolio")
        );
    }
}

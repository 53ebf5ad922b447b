use crate::accumulator::net::{NetBalance, NettingStrategy};
use crate::core::amount::Amount;
use crate::core::currency::CurrencyCode;
use crate::core::error::{Result, SettlementError};
use crate::core::pair::{align, CanonicalPair};
use crate::core::party::PartyId;
use crate::events::{PaymentSettlement, PaymentSlotEvent, PaymentVerification};
use crate::ledger::aggregate::NetChange;
use crate::ledger::key::SlotKey;
use crate::ledger::repository::{load_existing, load_or_create, Position, Repository};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Evidence submitted by the net payer of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    pub proof: String,
    pub verified_by: PartyId,
    pub amount: Amount,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfirmation {
    pub confirmed_by: PartyId,
    pub confirmed_at: DateTime<Utc>,
}

/// Settlement progress of a time slot. Independent of the netting balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotState {
    #[default]
    Open,
    Verified {
        proof: PaymentProof,
    },
    Settled {
        proof: PaymentProof,
        confirmation: SettlementConfirmation,
    },
}

/// Net payments of a pair in one currency due on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    key: SlotKey,
    balance: NetBalance,
    state: SlotState,
}

impl TimeSlot {
    pub fn balance(&self) -> &NetBalance {
        &self.balance
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    pub fn pair(&self) -> &CanonicalPair {
        &self.key.pair
    }

    pub fn date(&self) -> NaiveDate {
        self.key.date
    }

    pub fn year(&self) -> i32 {
        self.key.date.year()
    }

    pub fn month(&self) -> u32 {
        self.key.date.month()
    }

    pub fn day(&self) -> u32 {
        self.key.date.day()
    }

    pub fn proof(&self) -> Option<&PaymentProof> {
        match &self.state {
            SlotState::Open => None,
            SlotState::Verified { proof } | SlotState::Settled { proof, .. } => Some(proof),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.state, SlotState::Settled { .. })
    }
}

impl Position for TimeSlot {
    type Key = SlotKey;

    fn zeroed(key: SlotKey) -> Self {
        Self {
            key,
            balance: NetBalance::new(),
            state: SlotState::Open,
        }
    }

    fn key(&self) -> &SlotKey {
        &self.key
    }
}

/// Calendar-partitioned net payment ledger.
///
/// Slots always keep their totals, so registration and removal use the
/// totals-based algebra.
#[derive(Debug)]
pub struct PaymentSlotLedger<R> {
    repo: R,
}

impl<R: Repository<TimeSlot>> PaymentSlotLedger<R> {
    const STRATEGY: NettingStrategy = NettingStrategy::TotalsBased;

    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn slot_key(
        party0: &PartyId,
        party1: &PartyId,
        currency: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<(SlotKey, bool)> {
        let (pair, flipped) = CanonicalPair::orient(party0, party1)?;
        Ok((SlotKey::new(pair, currency.clone(), date), flipped))
    }

    fn ensure_open(slot: &TimeSlot) -> Result<()> {
        if slot.is_settled() {
            warn!("time slot {} is settled; change rejected", slot.key);
            return Err(SettlementError::AlreadySettled {
                key: slot.key.to_string(),
            });
        }
        Ok(())
    }

    /// The balance of a verified slot is frozen until it settles.
    fn ensure_unverified(slot: &TimeSlot) -> Result<()> {
        Self::ensure_open(slot)?;
        if let SlotState::Verified { proof } = &slot.state {
            warn!(
                "time slot {} has a pending proof from {}; change rejected",
                slot.key, proof.verified_by
            );
            return Err(SettlementError::PendingSettlement {
                key: slot.key.to_string(),
            });
        }
        Ok(())
    }

    /// `payer` must owe exactly `amount`, the slot's non-zero net payment.
    fn ensure_payment_matches(slot: &TimeSlot, payer: &PartyId, amount: Amount) -> Result<()> {
        let net = slot.balance.net_payment();
        if net.is_zero() {
            return Err(SettlementError::NothingToVerify {
                key: slot.key.to_string(),
            });
        }
        if amount != net {
            return Err(SettlementError::PaymentMismatch {
                key: slot.key.to_string(),
                expected: net,
                actual: amount,
            });
        }
        if slot.pair().party(slot.balance.payer()) != payer {
            return Err(SettlementError::PartyNotInPair {
                party: payer.clone(),
                pair: slot.key.pair_id(),
            });
        }
        Ok(())
    }

    pub fn register(&mut self, event: &PaymentSlotEvent) -> Result<NetChange> {
        self.register_with(event, |_| Ok(()))
    }

    /// Registers a payment, running `check` on the change before it is
    /// saved. An error from `check` leaves the slot untouched.
    pub fn register_with<F>(&mut self, event: &PaymentSlotEvent, check: F) -> Result<NetChange>
    where
        F: FnOnce(&NetChange) -> Result<()>,
    {
        let (key, flipped) =
            Self::slot_key(&event.party0, &event.party1, &event.currency, event.date)?;
        let (delta0, delta1) = align(flipped, event.payment0, event.payment1);

        let fetched = load_or_create::<TimeSlot, _>(&mut self.repo, &key)?;
        let created = fetched.was_created();
        let mut slot = fetched.into_inner();
        Self::ensure_unverified(&slot)?;

        let before = slot.balance;
        Self::STRATEGY.increase(&mut slot.balance, delta0, delta1)?;
        let change = NetChange {
            before,
            after: slot.balance,
            created,
        };
        check(&change)?;
        self.repo.save(&slot)?;

        if created {
            info!("time slot created for {} ({})", key, key.pair);
        }
        debug!(
            "time slot {} registered ({}, {}): net {} flipped {}",
            key,
            delta0,
            delta1,
            slot.balance.net_payment(),
            slot.balance.flipped()
        );
        Ok(change)
    }

    pub fn remove(&mut self, event: &PaymentSlotEvent) -> Result<NetChange> {
        self.remove_with(event, |_| Ok(()))
    }

    /// Removes a payment, running `check` on the change before it is saved.
    pub fn remove_with<F>(&mut self, event: &PaymentSlotEvent, check: F) -> Result<NetChange>
    where
        F: FnOnce(&NetChange) -> Result<()>,
    {
        let (key, flipped) =
            Self::slot_key(&event.party0, &event.party1, &event.currency, event.date)?;
        let (delta0, delta1) = align(flipped, event.payment0, event.payment1);

        let mut slot = load_existing::<TimeSlot, _>(&self.repo, &key)?;
        Self::ensure_unverified(&slot)?;

        let before = slot.balance;
        if let Err(err) = Self::STRATEGY.decrease(&mut slot.balance, delta0, delta1) {
            warn!("payment removal rejected on {}: {}", key, err);
            return Err(err);
        }
        let change = NetChange {
            before,
            after: slot.balance,
            created: false,
        };
        check(&change)?;
        self.repo.save(&slot)?;

        debug!(
            "time slot {} removed ({}, {}): net {} flipped {}",
            key,
            delta0,
            delta1,
            slot.balance.net_payment(),
            slot.balance.flipped()
        );
        Ok(change)
    }

    /// Records the net payer's proof of payment.
    ///
    /// The amount must equal the slot's current, non-zero net payment and
    /// the verifier must be the side owing it. A later verification
    /// replaces an earlier proof until the slot is settled; while a proof
    /// is pending the slot's payments are frozen.
    pub fn verify_payment(&mut self, event: &PaymentVerification) -> Result<()> {
        let (key, _) =
            Self::slot_key(&event.verifier, &event.counterparty, &event.currency, event.date)?;
        let mut slot = load_existing::<TimeSlot, _>(&self.repo, &key)?;
        Self::ensure_open(&slot)?;
        Self::ensure_payment_matches(&slot, &event.verifier, event.amount)?;

        slot.state = SlotState::Verified {
            proof: PaymentProof {
                proof: event.proof.clone(),
                verified_by: event.verifier.clone(),
                amount: event.amount,
                verified_at: event.timestamp,
            },
        };
        self.repo.save(&slot)?;
        info!(
            "time slot {} payment of {} verified by {}",
            key, event.amount, event.verifier
        );
        Ok(())
    }

    /// Marks a verified slot as settled. Only the counterparty of the
    /// verifier may confirm, quoting the same proof.
    pub fn confirm_settlement(&mut self, event: &PaymentSettlement) -> Result<()> {
        let (key, _) =
            Self::slot_key(&event.confirmer, &event.counterparty, &event.currency, event.date)?;
        let mut slot = load_existing::<TimeSlot, _>(&self.repo, &key)?;

        let proof = match &slot.state {
            SlotState::Open => {
                return Err(SettlementError::NotVerified {
                    key: key.to_string(),
                })
            }
            SlotState::Settled { .. } => {
                return Err(SettlementError::AlreadySettled {
                    key: key.to_string(),
                })
            }
            SlotState::Verified { proof } => proof.clone(),
        };
        if proof.proof != event.proof {
            return Err(SettlementError::ProofMismatch {
                key: key.to_string(),
                recorded: proof.proof,
                given: event.proof.clone(),
            });
        }
        if proof.verified_by == event.confirmer {
            return Err(SettlementError::PartyNotInPair {
                party: event.confirmer.clone(),
                pair: key.pair_id(),
            });
        }
        Self::ensure_payment_matches(&slot, &proof.verified_by, proof.amount)?;

        slot.state = SlotState::Settled {
            proof,
            confirmation: SettlementConfirmation {
                confirmed_by: event.confirmer.clone(),
                confirmed_at: event.timestamp,
            },
        };
        self.repo.save(&slot)?;
        info!("time slot {} settled, confirmed by {}", key, event.confirmer);
        Ok(())
    }

    /// Looks up a slot for a pair given in either order.
    pub fn slot(
        &self,
        party0: &PartyId,
        party1: &PartyId,
        currency: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<Option<TimeSlot>> {
        let (key, _) = Self::slot_key(party0, party1, currency, date)?;
        Ok(self.repo.load(&key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::repository::tests::FailingRepository;
    use crate::ledger::repository::InMemoryRepository;
    use chrono::TimeZone;

    fn alice() -> PartyId {
        PartyId::new("0xaaaa")
    }

    fn bob() -> PartyId {
        PartyId::new("0xbbbb")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 28, 12, 0, 0).unwrap()
    }

    fn payment(party0: PartyId, party1: PartyId, payment0: u64, payment1: u64) -> PaymentSlotEvent {
        PaymentSlotEvent {
            party0,
            party1,
            currency: CurrencyCode::new("FIL"),
            payment0: Amount::from(payment0),
            payment1: Amount::from(payment1),
            date: date(),
        }
    }

    fn verification(verifier: PartyId, counterparty: PartyId, amount: u64) -> PaymentVerification {
        PaymentVerification {
            verifier,
            counterparty,
            currency: CurrencyCode::new("FIL"),
            date: date(),
            amount: Amount::from(amount),
            proof: "0xfeed".into(),
            timestamp: at(),
        }
    }

    fn settlement(confirmer: PartyId, counterparty: PartyId, proof: &str) -> PaymentSettlement {
        PaymentSettlement {
            confirmer,
            counterparty,
            currency: CurrencyCode::new("FIL"),
            date: date(),
            proof: proof.into(),
            timestamp: at(),
        }
    }

    fn ledger() -> PaymentSlotLedger<InMemoryRepository<TimeSlot>> {
        PaymentSlotLedger::new(InMemoryRepository::new())
    }

    #[test]
    fn test_register_and_remove_round_trip() {
        let mut ledger = ledger();
        let first = ledger.register(&payment(alice(), bob(), 100, 40)).unwrap();
        assert!(first.created);
        ledger.register(&payment(bob(), alice(), 80, 0)).unwrap();

        let slot = ledger
            .slot(&alice(), &bob(), &CurrencyCode::new("FIL"), date())
            .unwrap()
            .unwrap();
        assert_eq!(slot.balance().net_payment(), Amount::from(20));
        assert!(slot.balance().flipped());
        assert_eq!((slot.year(), slot.month(), slot.day()), (2024, 6, 28));

        let change = ledger.remove(&payment(bob(), alice(), 80, 0)).unwrap();
        assert_eq!(change.after, first.after);
    }

    #[test]
    fn test_dates_partition_slots() {
        let mut ledger = ledger();
        ledger.register(&payment(alice(), bob(), 10, 0)).unwrap();
        let mut later = payment(alice(), bob(), 10, 0);
        later.date = date().succ_opt().unwrap();
        assert!(ledger.register(&later).unwrap().created);
        assert_eq!(ledger.repository().len(), 2);
    }

    #[test]
    fn test_remove_missing_slot() {
        let mut ledger = ledger();
        let err = ledger.remove(&payment(alice(), bob(), 1, 0)).unwrap_err();
        assert!(matches!(err, SettlementError::MissingPosition { .. }));
    }

    #[test]
    fn test_verify_and_settle() {
        let mut ledger = ledger();
        // bob owes alice a net 30
        ledger.register(&payment(alice(), bob(), 10, 40)).unwrap();

        let err = ledger
            .verify_payment(&verification(alice(), bob(), 30))
            .unwrap_err();
        assert!(matches!(err, SettlementError::PartyNotInPair { .. }));

        let err = ledger
            .verify_payment(&verification(bob(), alice(), 25))
            .unwrap_err();
        assert_eq!(
            err,
            SettlementError::PaymentMismatch {
                key: err_key(&ledger),
                expected: Amount::from(30),
                actual: Amount::from(25),
            }
        );

        ledger.verify_payment(&verification(bob(), alice(), 30)).unwrap();

        let err = ledger
            .confirm_settlement(&settlement(alice(), bob(), "0xbeef"))
            .unwrap_err();
        assert!(matches!(err, SettlementError::ProofMismatch { .. }));
        let err = ledger
            .confirm_settlement(&settlement(bob(), alice(), "0xfeed"))
            .unwrap_err();
        assert!(matches!(err, SettlementError::PartyNotInPair { .. }));

        ledger
            .confirm_settlement(&settlement(alice(), bob(), "0xfeed"))
            .unwrap();
        let slot = ledger
            .slot(&alice(), &bob(), &CurrencyCode::new("FIL"), date())
            .unwrap()
            .unwrap();
        assert!(slot.is_settled());
        assert_eq!(slot.proof().unwrap().verified_by, bob());

        let err = ledger.register(&payment(alice(), bob(), 1, 0)).unwrap_err();
        assert!(matches!(err, SettlementError::AlreadySettled { .. }));
        let err = ledger
            .confirm_settlement(&settlement(alice(), bob(), "0xfeed"))
            .unwrap_err();
        assert!(matches!(err, SettlementError::AlreadySettled { .. }));
    }

    fn err_key(ledger: &PaymentSlotLedger<InMemoryRepository<TimeSlot>>) -> String {
        ledger.repository().positions().next().unwrap().key().to_string()
    }

    #[test]
    fn test_confirm_requires_verification() {
        let mut ledger = ledger();
        ledger.register(&payment(alice(), bob(), 10, 40)).unwrap();
        let err = ledger
            .confirm_settlement(&settlement(alice(), bob(), "0xfeed"))
            .unwrap_err();
        assert!(matches!(err, SettlementError::NotVerified { .. }));
    }

    #[test]
    fn test_repository_failure_surfaces() {
        let mut ledger = PaymentSlotLedger::new(FailingRepository);
        let err = ledger.register(&payment(alice(), bob(), 1, 0)).unwrap_err();
        assert!(matches!(err, SettlementError::Repository(_)));
    }

    #[test]
    fn test_verified_slot_freezes_payments() {
        let mut ledger = ledger();
        ledger.register(&payment(alice(), bob(), 10, 40)).unwrap();
        ledger.verify_payment(&verification(bob(), alice(), 30)).unwrap();

        let err = ledger.register(&payment(alice(), bob(), 500, 0)).unwrap_err();
        assert!(matches!(err, SettlementError::PendingSettlement { .. }));
        let err = ledger.remove(&payment(alice(), bob(), 10, 0)).unwrap_err();
        assert!(matches!(err, SettlementError::PendingSettlement { .. }));

        ledger
            .confirm_settlement(&settlement(alice(), bob(), "0xfeed"))
            .unwrap();
        let slot = ledger
            .slot(&alice(), &bob(), &CurrencyCode::new("FIL"), date())
            .unwrap()
            .unwrap();
        assert!(slot.is_settled());
        assert_eq!(slot.balance().net_payment(), Amount::from(30));
        assert_eq!(slot.proof().unwrap().amount, slot.balance().net_payment());
    }

    #[test]
    fn test_confirm_rechecks_stale_proof() {
        let key = SlotKey::new(
            CanonicalPair::new(&alice(), &bob()).unwrap(),
            CurrencyCode::new("FIL"),
            date(),
        );
        let mut slot = TimeSlot::zeroed(key);
        // alice now owes 470, but the stored proof says bob paid 30
        NettingStrategy::TotalsBased
            .increase(&mut slot.balance, Amount::from(510), Amount::from(40))
            .unwrap();
        slot.state = SlotState::Verified {
            proof: PaymentProof {
                proof: "0xfeed".into(),
                verified_by: bob(),
                amount: Amount::from(30),
                verified_at: at(),
            },
        };
        let mut repo = InMemoryRepository::new();
        repo.save(&slot).unwrap();
        let mut ledger = PaymentSlotLedger::new(repo);

        let err = ledger
            .confirm_settlement(&settlement(alice(), bob(), "0xfeed"))
            .unwrap_err();
        assert!(matches!(err, SettlementError::PaymentMismatch { .. }));
        let stored = ledger
            .slot(&alice(), &bob(), &CurrencyCode::new("FIL"), date())
            .unwrap()
            .unwrap();
        assert!(!stored.is_settled());
    }

    #[test]
    fn test_zero_net_cannot_be_verified() {
        let mut ledger = ledger();
        ledger.register(&payment(alice(), bob(), 40, 40)).unwrap();
        let err = ledger
            .verify_payment(&verification(alice(), bob(), 0))
            .unwrap_err();
        assert!(matches!(err, SettlementError::NothingToVerify { .. }));
    }

    #[test]
    fn test_amount_checked_before_payer() {
        let mut ledger = ledger();
        ledger.register(&payment(alice(), bob(), 10, 40)).unwrap();
        // wrong side and wrong amount: the amount is reported
        let err = ledger
            .verify_payment(&verification(alice(), bob(), 25))
            .unwrap_err();
        assert!(matches!(err, SettlementError::PaymentMismatch { .. }));
    }

    #[test]
    fn test_failed_check_leaves_slot_untouched() {
        let mut ledger = ledger();
        ledger.register(&payment(alice(), bob(), 10, 0)).unwrap();
        let err = ledger
            .register_with(&payment(alice(), bob(), 5, 0), |_| {
                Err(SettlementError::NothingToVerify { key: "k".into() })
            })
            .unwrap_err();
        assert!(matches!(err, SettlementError::NothingToVerify { .. }));
        let slot = ledger
            .slot(&alice(), &bob(), &CurrencyCode::new("FIL"), date())
            .unwrap()
            .unwrap();
        assert_eq!(slot.balance().total0(), Amount::from(10));
    }

    #[test]
    fn test_slot_state_serializes_tagged() {
        let slot = TimeSlot::zeroed(SlotKey::new(
            CanonicalPair::new(&alice(), &bob()).unwrap(),
            CurrencyCode::new("FIL"),
            date(),
        ));
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["state"]["state"], "open");
    }
}

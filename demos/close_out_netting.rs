//! Close-out netting between two counterparties.
//!
//! Shows how payments reported in either party order land on one canonical
//! position, and how the totals-based and delta-only strategies differ.

use bilateral_settlement::prelude::*;
use bilateral_settlement::events::CloseOutAdjustment;
use rust_decimal_macros::dec;

fn adjustment(
    party0: &PartyId,
    party1: &PartyId,
    payment0: Amount,
    payment1: Amount,
    is_increase: bool,
) -> SettlementEvent {
    SettlementEvent::CloseOutPaymentAdjusted(CloseOutAdjustment {
        party0: party0.clone(),
        party1: party1.clone(),
        currency: CurrencyCode::new("USDC"),
        payment0,
        payment1,
        is_increase,
    })
}

fn run(strategy: NettingStrategy, alice: &PartyId, bob: &PartyId) -> Result<()> {
    let mut engine = SettlementEngine::in_memory(&EngineConfig {
        close_out_strategy: strategy,
    });
    let usdc = CurrencyCode::new("USDC");

    let steps = [
        ("alice 100 / bob 40", adjustment(alice, bob, Amount::new(dec!(100))?, Amount::new(dec!(40))?, true)),
        ("bob 80 (reported bob-first)", adjustment(bob, alice, Amount::new(dec!(80))?, Amount::ZERO, true)),
        ("undo bob 80", adjustment(alice, bob, Amount::ZERO, Amount::new(dec!(80))?, false)),
    ];

    println!("━━━ Strategy: {:?} ━━━\n", strategy);
    for (label, event) in &steps {
        engine.apply(event)?;
        if let Some(pos) = engine.close_outs().position(alice, bob, &usdc)? {
            let balance = pos.balance();
            println!(
                "  {:<30} totals {:>6} / {:>6}   net {:>6} paid by {}",
                label,
                balance.total0(),
                balance.total1(),
                balance.net_payment(),
                pos.pair().party(balance.payer())
            );
        }
    }

    let totals = engine.close_out_totals().get(&usdc);
    println!(
        "\n  USDC gross {}  net {}  saved {}\n",
        totals.gross_payment(),
        totals.net_payment(),
        totals.savings()
    );
    Ok(())
}

fn main() -> Result<()> {
    println!("╔══════════════════════════════════════════════╗");
    println!("║  bilateral-settlement: Close-out Netting     ║");
    println!("╚══════════════════════════════════════════════╝\n");

    let alice = PartyId::new("0x00000000000000000000000000000000000a11ce");
    let bob = PartyId::new("0x0000000000000000000000000000000000000b0b");

    let (pair, flipped) = CanonicalPair::orient(&alice, &bob)?;
    println!("Pair id:   {}", pair.id());
    println!("side0:     {}", pair.side0());
    println!("side1:     {}", pair.side1());
    println!("(alice, bob) is flipped: {}\n", flipped);

    run(NettingStrategy::TotalsBased, &alice, &bob)?;
    run(NettingStrategy::DeltaOnly, &alice, &bob)?;
    Ok(())
}

//! Collateral lifecycle: use, settle, revalue and release.

use bilateral_settlement::prelude::*;
use bilateral_settlement::events::{CollateralMovement, CollateralRevaluation};
use bilateral_settlement::ledger::collateral::CollateralPosition;

fn movement(a: &PartyId, b: &PartyId, amount0: u64, amount1: u64, settled: bool) -> CollateralMovement {
    CollateralMovement {
        party_a: a.clone(),
        party_b: b.clone(),
        currency: CurrencyCode::new("ETH"),
        amount0: Amount::from(amount0),
        amount1: Amount::from(amount1),
        settled,
    }
}

fn show(label: &str, pos: &CollateralPosition, alice: &PartyId, bob: &PartyId) {
    println!("{}", label);
    for (name, party) in [("alice", alice), ("bob", bob)] {
        println!(
            "    {:<6} settled {:>5}  unsettled {:>5}",
            name,
            pos.settled_for(party).unwrap_or_default(),
            pos.unsettled_for(party).unwrap_or_default()
        );
    }
}

fn main() -> Result<()> {
    println!("╔══════════════════════════════════════════════╗");
    println!("║  bilateral-settlement: Collateral Lifecycle  ║");
    println!("╚══════════════════════════════════════════════╝\n");

    let alice = PartyId::new("0x00000000000000000000000000000000000a11ce");
    let bob = PartyId::new("0x0000000000000000000000000000000000000b0b");
    let eth = CurrencyCode::new("ETH");
    let mut engine = SettlementEngine::in_memory(&EngineConfig::default());

    let steps = [
        ("1. alice posts 50, bob posts 20 (pending)", SettlementEvent::CollateralUsed(movement(&alice, &bob, 50, 20, false))),
        ("2. alice's 50 confirmed on-chain", SettlementEvent::CollateralSettled(movement(&alice, &bob, 50, 0, false))),
        (
            "3. alice's collateral revalued to 65",
            SettlementEvent::CollateralMarkedToMarket(CollateralRevaluation {
                party_a: bob.clone(),
                party_b: alice.clone(),
                currency: eth.clone(),
                previous0: Amount::ZERO,
                previous1: Amount::from(50),
                current0: Amount::ZERO,
                current1: Amount::from(65),
            }),
        ),
        ("4. bob withdraws his pending 20", SettlementEvent::CollateralReleased(movement(&bob, &alice, 20, 0, false))),
    ];

    for (label, event) in &steps {
        engine.apply(event)?;
        if let Some(pos) = engine.collateral().position(&alice, &bob, &eth)? {
            show(label, &pos, &alice, &bob);
        }
    }

    println!("\n5. alice tries to settle 1 more than she has pending:");
    match engine.apply(&SettlementEvent::CollateralSettled(movement(&alice, &bob, 1, 0, false))) {
        Ok(_) => println!("    unexpectedly accepted"),
        Err(e) => println!("    rejected: {}", e),
    }
    Ok(())
}
